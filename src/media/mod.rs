// Media processing built on external tools
//
// - runner: the single "run external tool" primitive (timeout + forced kill)
// - ladder: ordered fallback strategies with per-strategy timeouts
// - commands: ffmpeg/ffprobe command builders
// - processor: the ffmpeg-backed MediaProcessor

pub mod commands;
pub mod ladder;
pub mod processor;
pub mod runner;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use commands::*;
pub use ladder::*;
pub use processor::*;
pub use runner::*;

use crate::config::ToolsConfig;
use crate::error::Result;

/// Strategy that produced the final muxed video, in ladder order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MuxStrategy {
    ExplicitMap,
    SimpleMap,
    Unmapped,
    SilentCanvas,
    /// Every mux failed; the original video was copied through unchanged
    OriginalPassthrough,
}

impl MuxStrategy {
    pub fn is_passthrough(&self) -> bool {
        matches!(self, MuxStrategy::OriginalPassthrough)
    }
}

/// Strategy that produced the concatenated audio, in ladder order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcatStrategy {
    ManifestCopy,
    ManifestReencode,
    FilterGraph,
}

/// Main trait for media processing operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessor: Send + Sync {
    /// Check the media tool is installed, returning its version line
    async fn check_availability(&self) -> Result<String>;

    /// Container duration in seconds
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    /// Extract the narration track from a video
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()>;

    /// Cut `[start, start + duration)` out of an audio file
    async fn cut_segment(&self, audio_path: &Path, start: f64, duration: f64, output_path: &Path) -> Result<()>;

    /// Re-encode a whole audio file into the chunk format
    async fn reformat_audio(&self, input_path: &Path, output_path: &Path) -> Result<()>;

    /// Write silence of the given length
    async fn generate_silence(&self, duration: f64, output_path: &Path) -> Result<()>;

    /// Join audio files in order
    async fn concat_audio(&self, inputs: &[PathBuf], output_path: &Path) -> Result<ConcatStrategy>;

    /// Replace the audio of `video_path` with `audio_path`, keeping the picture stream
    async fn mux(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
        source_duration: f64,
    ) -> Result<MuxStrategy>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: ToolsConfig) -> Arc<dyn MediaProcessor> {
        Arc::new(processor::FfmpegProcessor::new(config, Arc::new(ProcessRunner::new())))
    }
}
