use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::ToolsConfig;
use crate::error::{Result, RedubError};
use super::{
    AttemptLadder, ConcatStrategy, MediaCommandBuilder, MediaProcessor, MuxStrategy, ToolRunner, audio_codec_for,
};

/// Muxed output may drift this far from the source before strategy 1 rejects it
const MUX_DURATION_TOLERANCE: f64 = 0.10;

/// Concatenated audio may drift this far from the sum of its pieces
const CONCAT_DURATION_TOLERANCE: f64 = 0.05;

/// Relative difference between a measured and an expected duration
pub fn relative_deviation(actual: f64, expected: f64) -> f64 {
    if expected <= 0.0 {
        return if actual <= 0.0 { 0.0 } else { f64::INFINITY };
    }
    (actual - expected).abs() / expected
}

/// Fail unless the tool left a non-empty file behind
pub async fn verify_output(path: &Path) -> Result<u64> {
    match fs::metadata(path).await {
        Ok(meta) if meta.len() > 0 => Ok(meta.len()),
        Ok(_) => Err(RedubError::Tool(format!("{} is empty", path.display()))),
        Err(_) => Err(RedubError::Tool(format!("{} was not produced", path.display()))),
    }
}

/// ffmpeg-backed media processor
pub struct FfmpegProcessor {
    config: ToolsConfig,
    commands: MediaCommandBuilder,
    runner: Arc<dyn ToolRunner>,
}

impl FfmpegProcessor {
    pub fn new(config: ToolsConfig, runner: Arc<dyn ToolRunner>) -> Self {
        let commands = MediaCommandBuilder::new(&config.ffmpeg_path, &config.ffprobe_path);
        Self {
            config,
            commands,
            runner,
        }
    }

    async fn run_and_verify(&self, command: super::MediaCommand, output: &Path) -> Result<u64> {
        command.execute(self.runner.as_ref()).await?;
        verify_output(output).await
    }

    async fn write_manifest(&self, inputs: &[PathBuf], output_path: &Path) -> Result<PathBuf> {
        let manifest = output_path.with_extension("concat.txt");
        let mut content = String::new();
        for input in inputs {
            let absolute = if input.is_absolute() {
                input.clone()
            } else {
                std::env::current_dir()?.join(input)
            };
            // concat demuxer quoting: close quote, escaped quote, reopen
            let escaped = absolute.to_string_lossy().replace('\'', "'\\''");
            content.push_str(&format!("file '{}'\n", escaped));
        }
        fs::write(&manifest, content).await?;
        Ok(manifest)
    }

    async fn mux_with_duration_check(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
        source_duration: f64,
        timeout: Duration,
    ) -> Result<MuxStrategy> {
        let command = self
            .commands
            .mux_explicit(video_path, audio_path, output_path, &self.config.audio_codec, &self.config.audio_bitrate)
            .timeout(timeout);
        self.run_and_verify(command, output_path).await?;

        let muxed = self.probe_duration(output_path).await?;
        let deviation = relative_deviation(muxed, source_duration);
        if deviation > MUX_DURATION_TOLERANCE {
            return Err(RedubError::Tool(format!(
                "muxed duration {:.1}s deviates {:.0}% from source {:.1}s",
                muxed,
                deviation * 100.0,
                source_duration
            )));
        }
        Ok(MuxStrategy::ExplicitMap)
    }

    /// Sum of the piece durations, or None when any piece cannot be probed
    async fn expected_concat_duration(&self, inputs: &[PathBuf]) -> Option<f64> {
        let mut total = 0.0;
        for input in inputs {
            match self.probe_duration(input).await {
                Ok(duration) => total += duration,
                Err(e) => {
                    debug!("Skipping concat duration check, {} did not probe: {}", input.display(), e);
                    return None;
                }
            }
        }
        Some(total)
    }

    /// Manifest concat writes a file even when the pieces disagree on stream
    /// parameters, so its result is only trusted if the length adds up
    async fn concat_with_duration_check(
        &self,
        command: super::MediaCommand,
        output_path: &Path,
        expected: Option<f64>,
    ) -> Result<()> {
        self.run_and_verify(command, output_path).await?;
        let Some(expected) = expected else {
            return Ok(());
        };
        let actual = self.probe_duration(output_path).await?;
        let deviation = relative_deviation(actual, expected);
        if deviation > CONCAT_DURATION_TOLERANCE {
            return Err(RedubError::Tool(format!(
                "concatenated duration {:.1}s deviates {:.0}% from its pieces {:.1}s",
                actual,
                deviation * 100.0,
                expected
            )));
        }
        Ok(())
    }

    async fn passthrough(&self, video_path: &Path, output_path: &Path) -> Result<MuxStrategy> {
        fs::copy(video_path, output_path).await?;
        verify_output(output_path).await?;
        Ok(MuxStrategy::OriginalPassthrough)
    }
}

#[async_trait]
impl MediaProcessor for FfmpegProcessor {
    async fn check_availability(&self) -> Result<String> {
        let output = self
            .commands
            .version_check()
            .timeout(self.config.quick_timeout())
            .execute(self.runner.as_ref())
            .await
            .map_err(|e| RedubError::Tool(format!("Media processor not available: {}", e)))?;

        let version = output.stdout.lines().next().unwrap_or("Unknown version").to_string();
        info!("Media processor is available: {}", version);
        Ok(version)
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let output = self
            .commands
            .probe_duration(path)
            .timeout(self.config.quick_timeout())
            .execute(self.runner.as_ref())
            .await?;

        let raw = output.stdout.trim();
        let duration: f64 = raw
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|_| RedubError::Tool(format!("Unparseable duration '{}' for {}", raw, path.display())))?;

        if !duration.is_finite() || duration < 0.0 {
            return Err(RedubError::Tool(format!("Invalid duration {} for {}", duration, path.display())));
        }
        debug!("Probed {}: {:.3}s", path.display(), duration);
        Ok(duration)
    }

    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        info!("Extracting audio from {} to {}", video_path.display(), audio_path.display());
        let rate = self.config.chunk_sample_rate;
        let timeout = self.config.extract_timeout();

        AttemptLadder::new("audio extraction")
            .strategy("pcm", timeout, |t| async move {
                let cmd = self.commands.extract_audio_pcm(video_path, audio_path, rate).timeout(t);
                self.run_and_verify(cmd, audio_path).await
            })
            .strategy("first-stream", timeout, |t| async move {
                let cmd = self.commands.extract_audio_first_stream(video_path, audio_path, rate).timeout(t);
                self.run_and_verify(cmd, audio_path).await
            })
            .run()
            .await?;

        info!("Audio extraction completed");
        Ok(())
    }

    async fn cut_segment(&self, audio_path: &Path, start: f64, duration: f64, output_path: &Path) -> Result<()> {
        let rate = self.config.chunk_sample_rate;
        let timeout = self.config.chunk_timeout();

        AttemptLadder::new(format!("chunk cut @{:.1}s", start))
            .strategy("accurate-seek", timeout, |t| async move {
                let cmd = self.commands.cut_accurate(audio_path, output_path, start, duration).timeout(t);
                self.run_and_verify(cmd, output_path).await
            })
            .strategy("input-seek", timeout, |t| async move {
                let cmd = self
                    .commands
                    .cut_reencode(audio_path, output_path, start, duration, rate)
                    .timeout(t);
                self.run_and_verify(cmd, output_path).await
            })
            .run()
            .await?;
        Ok(())
    }

    async fn reformat_audio(&self, input_path: &Path, output_path: &Path) -> Result<()> {
        let cmd = self
            .commands
            .reformat_audio(input_path, output_path, self.config.chunk_sample_rate)
            .timeout(self.config.extract_timeout());
        self.run_and_verify(cmd, output_path).await?;
        Ok(())
    }

    async fn generate_silence(&self, duration: f64, output_path: &Path) -> Result<()> {
        let cmd = self
            .commands
            .silence(output_path, duration, self.config.dub_sample_rate)
            .timeout(self.config.chunk_timeout());
        self.run_and_verify(cmd, output_path).await?;
        Ok(())
    }

    async fn concat_audio(&self, inputs: &[PathBuf], output_path: &Path) -> Result<ConcatStrategy> {
        if inputs.is_empty() {
            return Err(RedubError::Validation("nothing to concatenate".to_string()));
        }
        info!("Concatenating {} audio chunks into {}", inputs.len(), output_path.display());

        let expected = self.expected_concat_duration(inputs).await;
        let manifest = self.write_manifest(inputs, output_path).await?;
        let manifest = manifest.as_path();
        let timeout = self.config.concat_timeout();
        // the mux codec is for the video container, not this intermediate file
        let codec = audio_codec_for(output_path, &self.config.audio_codec);
        let bitrate = self.config.audio_bitrate.as_str();
        let rate = self.config.dub_sample_rate;

        let success = AttemptLadder::new("audio concatenation")
            .strategy("manifest-copy", timeout, |t| async move {
                let cmd = self.commands.concat_manifest_copy(manifest, output_path).timeout(t);
                self.concat_with_duration_check(cmd, output_path, expected)
                    .await
                    .map(|_| ConcatStrategy::ManifestCopy)
            })
            .strategy("manifest-reencode", timeout, |t| async move {
                let cmd = self
                    .commands
                    .concat_manifest_reencode(manifest, output_path, codec, bitrate, rate)
                    .timeout(t);
                self.concat_with_duration_check(cmd, output_path, expected)
                    .await
                    .map(|_| ConcatStrategy::ManifestReencode)
            })
            .strategy("filter-graph", timeout, |t| async move {
                let cmd = self
                    .commands
                    .concat_filter(inputs, output_path.to_path_buf(), codec, bitrate, rate)
                    .timeout(t);
                self.run_and_verify(cmd, output_path).await.map(|_| ConcatStrategy::FilterGraph)
            })
            .run()
            .await;

        if let Err(e) = fs::remove_file(manifest).await {
            debug!("Could not remove concat manifest {}: {}", manifest.display(), e);
        }
        Ok(success?.value)
    }

    async fn mux(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
        source_duration: f64,
    ) -> Result<MuxStrategy> {
        info!(
            "Muxing {} with {} -> {}",
            video_path.display(),
            audio_path.display(),
            output_path.display()
        );
        let codec = self.config.audio_codec.as_str();
        let bitrate = self.config.audio_bitrate.as_str();
        let video_bitrate = self.config.video_bitrate.as_str();

        let success = AttemptLadder::new("video mux")
            .strategy("explicit-map", self.config.mux_timeout(0), |t| async move {
                self.mux_with_duration_check(video_path, audio_path, output_path, source_duration, t)
                    .await
            })
            .strategy("simple-map", self.config.mux_timeout(1), |t| async move {
                let cmd = self.commands.mux_simple(video_path, audio_path, output_path, codec, bitrate).timeout(t);
                self.run_and_verify(cmd, output_path).await.map(|_| MuxStrategy::SimpleMap)
            })
            .strategy("unmapped", self.config.mux_timeout(2), |t| async move {
                let cmd = self
                    .commands
                    .mux_unmapped(video_path, audio_path, output_path, codec, bitrate)
                    .timeout(t);
                self.run_and_verify(cmd, output_path).await.map(|_| MuxStrategy::Unmapped)
            })
            .strategy("silent-canvas", self.config.mux_timeout(3), |t| async move {
                let cmd = self
                    .commands
                    .mux_silent_canvas(audio_path, output_path, source_duration, codec, bitrate, video_bitrate)
                    .timeout(t);
                self.run_and_verify(cmd, output_path).await.map(|_| MuxStrategy::SilentCanvas)
            })
            .strategy("original-passthrough", self.config.quick_timeout(), |_| async move {
                self.passthrough(video_path, output_path).await
            })
            .run()
            .await?;

        if success.value.is_passthrough() {
            warn!("Every mux strategy failed; output is the untouched original video");
        }
        Ok(success.value)
    }
}
