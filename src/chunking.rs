//! Fixed-duration chunking of an audio track.
//!
//! The engine always hands back at least one chunk. When every real segment
//! fails validation it substitutes the whole reformatted track, and when even
//! that fails, a short synthetic silence. The substitution is recorded in
//! [`ChunkFallback`] so callers can flag the result as degraded.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{Result, RedubError};
use crate::media::MediaProcessor;

/// Shortest nominal chunk length accepted by the engine
pub const MIN_CHUNK_DURATION_SECS: f64 = 5.0;

/// Length of the synthetic silent placeholder
pub const PLACEHOLDER_DURATION_SECS: f64 = 1.0;

const PLACEHOLDER_SAMPLE_RATE: u32 = 16000;

/// Planned time range of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkWindow {
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl ChunkWindow {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Where a chunk's audio came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkOrigin {
    Segment,
    WholeFile,
    SilentPlaceholder,
}

/// A file-backed slice of the source audio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioChunk {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub size_bytes: u64,
    pub path: PathBuf,
    pub origin: ChunkOrigin,
}

/// Which substitution, if any, replaced the real segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkFallback {
    None,
    WholeFile,
    SilentPlaceholder,
}

#[derive(Debug, Clone)]
pub struct ChunkSet {
    pub chunks: Vec<AudioChunk>,
    pub fallback: ChunkFallback,
    /// Planned windows that were dropped
    pub dropped: usize,
    /// Probed length of the source audio, 0 when the probe failed
    pub total_duration: f64,
}

impl ChunkSet {
    pub fn is_degraded(&self) -> bool {
        self.fallback != ChunkFallback::None
    }
}

/// Remainders shorter than this are float noise, folded into the last window
const WINDOW_REMAINDER_EPSILON_SECS: f64 = 1e-6;

/// Split `total` seconds into `ceil(total / chunk_duration)` contiguous windows.
/// The last window carries the remainder.
pub fn plan_windows(total: f64, chunk_duration: f64) -> Vec<ChunkWindow> {
    if !(total > 0.0) || !(chunk_duration > 0.0) {
        return Vec::new();
    }

    let whole = (total / chunk_duration).floor();
    let remainder = total - whole * chunk_duration;
    let count = if remainder > WINDOW_REMAINDER_EPSILON_SECS {
        whole as usize + 1
    } else {
        (whole as usize).max(1)
    };
    (0..count)
        .map(|index| {
            let start = index as f64 * chunk_duration;
            let end = if index + 1 == count {
                total
            } else {
                ((index + 1) as f64 * chunk_duration).min(total)
            };
            ChunkWindow { index, start, end }
        })
        .collect()
}

pub struct ChunkingEngine {
    media: Arc<dyn MediaProcessor>,
    min_duration: f64,
    min_bytes: u64,
}

impl ChunkingEngine {
    pub fn new(media: Arc<dyn MediaProcessor>, min_duration: f64, min_bytes: u64) -> Self {
        Self {
            media,
            min_duration,
            min_bytes,
        }
    }

    pub fn is_valid(&self, duration: f64, size_bytes: u64) -> bool {
        duration >= self.min_duration && size_bytes >= self.min_bytes
    }

    /// Cut `audio_path` into chunks inside `out_dir`. Never returns an empty set.
    pub async fn split(&self, audio_path: &Path, chunk_duration: f64, out_dir: &Path) -> Result<ChunkSet> {
        if chunk_duration < MIN_CHUNK_DURATION_SECS {
            return Err(RedubError::Validation(format!(
                "chunk duration {}s is below the {}s minimum",
                chunk_duration, MIN_CHUNK_DURATION_SECS
            )));
        }
        fs::create_dir_all(out_dir).await?;

        let total = match self.media.probe_duration(audio_path).await {
            Ok(total) => total,
            Err(e) => {
                warn!("Could not probe {}: {}", audio_path.display(), e);
                0.0
            }
        };

        let windows = plan_windows(total, chunk_duration);
        info!(
            "Splitting {:.1}s of audio into {} chunks of {}s",
            total,
            windows.len(),
            chunk_duration
        );

        let mut chunks = Vec::with_capacity(windows.len());
        for window in &windows {
            let path = out_dir.join(format!("chunk_{:03}.wav", window.index));
            if let Err(e) = self
                .media
                .cut_segment(audio_path, window.start, window.duration(), &path)
                .await
            {
                warn!("Dropping chunk {}: {}", window.index, e);
                continue;
            }

            match self.measure(&path, window.duration()).await {
                Some((duration, size_bytes)) if self.is_valid(duration, size_bytes) => {
                    chunks.push(AudioChunk {
                        index: window.index,
                        start: window.start,
                        end: window.end,
                        duration,
                        size_bytes,
                        path,
                        origin: ChunkOrigin::Segment,
                    });
                }
                measured => {
                    warn!("Dropping chunk {}: failed validation ({:?})", window.index, measured);
                    let _ = fs::remove_file(&path).await;
                }
            }
        }

        let dropped = windows.len() - chunks.len();
        if !chunks.is_empty() {
            if dropped > 0 {
                warn!("Continuing with {}/{} chunks", chunks.len(), windows.len());
            }
            return Ok(ChunkSet {
                chunks,
                fallback: ChunkFallback::None,
                dropped,
                total_duration: total,
            });
        }

        warn!("No usable chunks, falling back to the whole reformatted track");
        if let Some(chunk) = self.whole_file_chunk(audio_path, total, out_dir).await {
            return Ok(ChunkSet {
                chunks: vec![chunk],
                fallback: ChunkFallback::WholeFile,
                dropped,
                total_duration: total,
            });
        }

        warn!("Whole-track fallback failed, using a silent placeholder chunk");
        let chunk = self.silent_placeholder(out_dir)?;
        Ok(ChunkSet {
            chunks: vec![chunk],
            fallback: ChunkFallback::SilentPlaceholder,
            dropped,
            total_duration: total,
        })
    }

    /// Probed duration (planned duration when the probe fails) and size
    async fn measure(&self, path: &Path, planned: f64) -> Option<(f64, u64)> {
        let size = fs::metadata(path).await.ok()?.len();
        let duration = match self.media.probe_duration(path).await {
            Ok(d) => d,
            Err(e) => {
                debug!("Probe of {} failed, assuming planned {:.1}s: {}", path.display(), planned, e);
                planned
            }
        };
        Some((duration, size))
    }

    async fn whole_file_chunk(&self, audio_path: &Path, total: f64, out_dir: &Path) -> Option<AudioChunk> {
        let path = out_dir.join("chunk_full.wav");
        if let Err(e) = self.media.reformat_audio(audio_path, &path).await {
            warn!("Whole-track reformat failed: {}", e);
            return None;
        }
        let (duration, size_bytes) = self.measure(&path, total).await?;
        if !self.is_valid(duration, size_bytes) {
            warn!("Whole-track chunk failed validation ({:.2}s, {} bytes)", duration, size_bytes);
            return None;
        }
        Some(AudioChunk {
            index: 0,
            start: 0.0,
            end: duration,
            duration,
            size_bytes,
            path,
            origin: ChunkOrigin::WholeFile,
        })
    }

    fn silent_placeholder(&self, out_dir: &Path) -> Result<AudioChunk> {
        let path = out_dir.join("chunk_placeholder.wav");
        write_silent_wav(&path, PLACEHOLDER_DURATION_SECS)?;
        let size_bytes = std::fs::metadata(&path)?.len();
        Ok(AudioChunk {
            index: 0,
            start: 0.0,
            end: PLACEHOLDER_DURATION_SECS,
            duration: PLACEHOLDER_DURATION_SECS,
            size_bytes,
            path,
            origin: ChunkOrigin::SilentPlaceholder,
        })
    }
}

/// Mono 16-bit PCM silence written in-process, independent of external tools
pub fn write_silent_wav(path: &Path, duration_secs: f64) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: PLACEHOLDER_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    let samples = (PLACEHOLDER_SAMPLE_RATE as f64 * duration_secs).round() as u64;
    for _ in 0..samples {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{ConcatStrategy, MuxStrategy};
    use async_trait::async_trait;

    /// Media fake: cut segments carry their duration on the first line,
    /// padded to `segment_bytes`.
    struct FakeMedia {
        total: f64,
        segment_bytes: usize,
        fail_cuts: bool,
        fail_reformat: bool,
    }

    impl FakeMedia {
        fn write(path: &Path, duration: f64, bytes: usize) {
            let mut content = format!("{}\n", duration).into_bytes();
            content.resize(content.len().max(bytes), b'0');
            std::fs::write(path, content).unwrap();
        }
    }

    #[async_trait]
    impl MediaProcessor for FakeMedia {
        async fn check_availability(&self) -> Result<String> {
            Ok("fake".to_string())
        }

        async fn probe_duration(&self, path: &Path) -> Result<f64> {
            if path.file_name().and_then(|n| n.to_str()) == Some("source.wav") {
                return Ok(self.total);
            }
            let content = std::fs::read_to_string(path)?;
            content
                .lines()
                .next()
                .and_then(|l| l.parse().ok())
                .ok_or_else(|| RedubError::Tool("unparseable".to_string()))
        }

        async fn extract_audio(&self, _video: &Path, audio: &Path) -> Result<()> {
            Self::write(audio, self.total, 4096);
            Ok(())
        }

        async fn cut_segment(&self, _audio: &Path, _start: f64, duration: f64, output: &Path) -> Result<()> {
            if self.fail_cuts {
                return Err(RedubError::Tool("cut failed".to_string()));
            }
            Self::write(output, duration, self.segment_bytes);
            Ok(())
        }

        async fn reformat_audio(&self, _input: &Path, output: &Path) -> Result<()> {
            if self.fail_reformat {
                return Err(RedubError::Tool("reformat failed".to_string()));
            }
            Self::write(output, self.total, 4096);
            Ok(())
        }

        async fn generate_silence(&self, duration: f64, output: &Path) -> Result<()> {
            Self::write(output, duration, 2048);
            Ok(())
        }

        async fn concat_audio(&self, _inputs: &[PathBuf], _output: &Path) -> Result<ConcatStrategy> {
            Ok(ConcatStrategy::ManifestCopy)
        }

        async fn mux(&self, _v: &Path, _a: &Path, _o: &Path, _d: f64) -> Result<MuxStrategy> {
            Ok(MuxStrategy::ExplicitMap)
        }
    }

    fn engine(media: FakeMedia) -> ChunkingEngine {
        ChunkingEngine::new(Arc::new(media), 0.5, 1024)
    }

    #[test]
    fn three_hundred_seconds_in_180s_chunks() {
        let windows = plan_windows(300.0, 180.0);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].duration(), 180.0);
        assert_eq!(windows[1].duration(), 120.0);
    }

    #[test]
    fn windows_are_contiguous_and_cover_the_total() {
        for chunk in [5.0, 7.5, 30.0, 180.0, 600.0] {
            for total in [0.4, 4.99, 5.0, 59.9, 300.0, 361.25, 3600.0, 7201.0] {
                let windows = plan_windows(total, chunk);
                let expected = (total / chunk).ceil() as usize;
                assert_eq!(windows.len(), expected, "total={total} chunk={chunk}");
                assert_eq!(windows[0].start, 0.0);
                for pair in windows.windows(2) {
                    assert_eq!(pair[0].end, pair[1].start);
                    assert!(pair[0].duration() <= chunk + 1e-9);
                }
                assert_eq!(windows.last().unwrap().end, total);
                let sum: f64 = windows.iter().map(|w| w.duration()).sum();
                assert!((sum - total).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn exact_multiple_does_not_add_an_empty_window() {
        assert_eq!(plan_windows(360.0, 180.0).len(), 2);
        assert!(plan_windows(0.0, 180.0).is_empty());

        let noisy = plan_windows(360.0 + 1e-7, 180.0);
        assert_eq!(noisy.len(), 2);
        assert_eq!(noisy[1].end, 360.0 + 1e-7);
    }

    #[test]
    fn any_real_remainder_gets_its_own_window() {
        // the excess is under 1e-9 of a window
        let windows = plan_windows(7200.0 + 2e-6, 3600.0);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[2].start, 7200.0);

        assert_eq!(plan_windows(0.3, 0.1).len(), 3);
        assert_eq!(plan_windows(1e-7, 180.0).len(), 1);
    }

    #[tokio::test]
    async fn split_produces_validated_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.wav");
        std::fs::write(&source, b"x").unwrap();

        let set = engine(FakeMedia { total: 300.0, segment_bytes: 4096, fail_cuts: false, fail_reformat: false })
            .split(&source, 180.0, &dir.path().join("chunks"))
            .await
            .unwrap();

        assert_eq!(set.fallback, ChunkFallback::None);
        assert_eq!(set.chunks.len(), 2);
        assert_eq!(set.chunks[1].start, 180.0);
        assert_eq!(set.chunks[1].duration, 120.0);
        assert!(set.chunks.iter().all(|c| c.origin == ChunkOrigin::Segment));
    }

    #[tokio::test]
    async fn tiny_remainder_is_dropped_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.wav");
        std::fs::write(&source, b"x").unwrap();

        let set = engine(FakeMedia { total: 180.2, segment_bytes: 4096, fail_cuts: false, fail_reformat: false })
            .split(&source, 180.0, &dir.path().join("chunks"))
            .await
            .unwrap();

        assert_eq!(set.chunks.len(), 1);
        assert_eq!(set.dropped, 1);
        assert!(!set.is_degraded());
    }

    #[tokio::test]
    async fn undersized_chunks_trigger_whole_file_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.wav");
        std::fs::write(&source, b"x").unwrap();

        let set = engine(FakeMedia { total: 300.0, segment_bytes: 10, fail_cuts: false, fail_reformat: false })
            .split(&source, 180.0, &dir.path().join("chunks"))
            .await
            .unwrap();

        assert_eq!(set.fallback, ChunkFallback::WholeFile);
        assert_eq!(set.chunks.len(), 1);
        assert_eq!(set.chunks[0].origin, ChunkOrigin::WholeFile);
        assert!(set.is_degraded());
    }

    #[tokio::test]
    async fn total_failure_yields_silent_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.wav");
        std::fs::write(&source, b"x").unwrap();

        let set = engine(FakeMedia { total: 300.0, segment_bytes: 4096, fail_cuts: true, fail_reformat: true })
            .split(&source, 180.0, &dir.path().join("chunks"))
            .await
            .unwrap();

        assert_eq!(set.fallback, ChunkFallback::SilentPlaceholder);
        let chunk = &set.chunks[0];
        assert_eq!(chunk.origin, ChunkOrigin::SilentPlaceholder);
        let reader = hound::WavReader::open(&chunk.path).unwrap();
        assert_eq!(reader.duration(), PLACEHOLDER_SAMPLE_RATE);
    }

    #[tokio::test]
    async fn rejects_chunk_duration_below_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let result = engine(FakeMedia { total: 10.0, segment_bytes: 4096, fail_cuts: false, fail_reformat: false })
            .split(&dir.path().join("source.wav"), 2.0, dir.path())
            .await;
        assert!(matches!(result, Err(RedubError::Validation(_))));
    }
}
