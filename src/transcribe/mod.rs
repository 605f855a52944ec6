// Speech recognition seam
//
// - common: service-agnostic Recognition + transcript document mapping
// - selector: picks the best transcript among alternatives
// - http: recognition job service (submit, poll, fetch)
// - whisper_cli: local whisper command-line tool
//
// To add a recognizer, parse its output into a service-specific struct,
// implement TranscriptMapper for it and register it in RecognizerFactory.

pub mod common;
pub mod http;
pub mod selector;
pub mod whisper_cli;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

pub use common::*;
pub use selector::*;

use crate::config::{RecognitionConfig, RecognizerProvider, ToolsConfig};
use crate::error::Result;
use crate::media::ToolRunner;
use crate::retry::RetryPolicy;

/// One chunk to recognize. HTTP services read `media_uri`; local tools read
/// `audio_path`.
#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub job_name: String,
    pub audio_path: PathBuf,
    pub media_uri: Option<String>,
    pub language: String,
    pub chunk_index: usize,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Recognize speech in one chunk, returning every alternative offered
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Recognition>;
}

/// Factory for creating recognizer instances
pub struct RecognizerFactory;

impl RecognizerFactory {
    pub fn create_recognizer(
        config: RecognitionConfig,
        tools: ToolsConfig,
        runner: Arc<dyn ToolRunner>,
        retry: RetryPolicy,
    ) -> Arc<dyn SpeechRecognizer> {
        match config.provider {
            RecognizerProvider::Http => Arc::new(http::HttpRecognizer::new(config, retry)),
            RecognizerProvider::WhisperCli => {
                Arc::new(whisper_cli::WhisperCliRecognizer::new(tools, &config, runner))
            }
        }
    }
}
