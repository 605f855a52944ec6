//! Reassembly of translated audio with the original picture.
//!
//! Concatenation and muxing each run through their own fallback ladder inside
//! the media processor. Duration drift is measured and classified afterwards;
//! it is reported, never treated as a failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::Result;
use crate::job::SyncQuality;
use crate::media::{ConcatStrategy, MediaProcessor, MuxStrategy};

#[derive(Debug, Clone)]
pub struct ConcatOutcome {
    pub path: PathBuf,
    pub strategy: ConcatStrategy,
    pub duration: f64,
    pub sync: SyncQuality,
}

#[derive(Debug, Clone)]
pub struct MuxOutcome {
    pub path: PathBuf,
    pub strategy: MuxStrategy,
    pub duration: f64,
    pub sync: SyncQuality,
}

pub struct Reassembler {
    media: Arc<dyn MediaProcessor>,
}

impl Reassembler {
    pub fn new(media: Arc<dyn MediaProcessor>) -> Self {
        Self { media }
    }

    async fn measured(&self, path: &Path, what: &str) -> f64 {
        match self.media.probe_duration(path).await {
            Ok(duration) => duration,
            Err(e) => {
                warn!("Could not measure {} duration: {}", what, e);
                0.0
            }
        }
    }

    /// Join the ordered pieces into one track
    pub async fn concat(&self, pieces: &[PathBuf], output_path: &Path, source_duration: f64) -> Result<ConcatOutcome> {
        let strategy = self.media.concat_audio(pieces, output_path).await?;
        let duration = self.measured(output_path, "reassembled audio").await;
        let sync = SyncQuality::classify(duration, source_duration);
        info!(
            "Reassembled audio: {:.1}s vs source {:.1}s ({}, {:?})",
            duration, source_duration, sync, strategy
        );
        Ok(ConcatOutcome {
            path: output_path.to_path_buf(),
            strategy,
            duration,
            sync,
        })
    }

    /// Put the new track under the original picture
    pub async fn mux(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
        source_duration: f64,
    ) -> Result<MuxOutcome> {
        let strategy = self
            .media
            .mux(video_path, audio_path, output_path, source_duration)
            .await?;
        if strategy.is_passthrough() {
            warn!("Every mux strategy failed; the output is the untouched original video");
        }

        let duration = self.measured(output_path, "output video").await;
        let sync = SyncQuality::classify(duration, source_duration);
        if sync == SyncQuality::Poor {
            warn!("Output {:.1}s is far from source {:.1}s", duration, source_duration);
        } else {
            info!("Output video {:.1}s, sync {} ({:?})", duration, sync, strategy);
        }
        Ok(MuxOutcome {
            path: output_path.to_path_buf(),
            strategy,
            duration,
            sync,
        })
    }
}
