// Local `whisper` command-line recognizer
//
// Produces a single candidate per chunk; useful when no recognition service
// is reachable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::common::{Recognition, TranscriptMapper};
use super::{RecognitionRequest, SpeechRecognizer};
use crate::config::{RecognitionConfig, ToolsConfig};
use crate::error::{RedubError, Result};
use crate::media::{ToolInvocation, ToolRunner};

/// Whisper JSON output; only the fields the pipeline needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperOutput {
    pub text: String,
    #[serde(default)]
    pub segments: Vec<WhisperSegment>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

pub struct WhisperMapper;

impl TranscriptMapper<WhisperOutput> for WhisperMapper {
    fn to_recognition(output: WhisperOutput, language: &str) -> Recognition {
        let text = if output.text.trim().is_empty() {
            output
                .segments
                .iter()
                .map(|s| s.text.trim())
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            output.text
        };
        Recognition::single(text, output.language.as_deref().unwrap_or(language))
    }
}

pub struct WhisperCliRecognizer {
    tools: ToolsConfig,
    model: String,
    runner: Arc<dyn ToolRunner>,
}

impl WhisperCliRecognizer {
    pub fn new(tools: ToolsConfig, config: &RecognitionConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            tools,
            model: config.whisper_model.clone(),
            runner,
        }
    }
}

#[async_trait]
impl SpeechRecognizer for WhisperCliRecognizer {
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Recognition> {
        let output_dir = tempfile::tempdir()?;
        let invocation = ToolInvocation {
            program: self.tools.whisper_path.clone(),
            args: vec![
                request.audio_path.to_string_lossy().to_string(),
                "--model".into(),
                self.model.clone(),
                "--language".into(),
                request.language.clone(),
                "--output_format".into(),
                "json".into(),
                "--output_dir".into(),
                output_dir.path().to_string_lossy().to_string(),
            ],
            description: format!("whisper transcription of chunk {}", request.chunk_index),
            timeout: std::time::Duration::from_secs(self.tools.transcribe_timeout_secs),
        };

        self.runner
            .run(&invocation)
            .await?
            .ensure_success(&invocation.description)
            .map_err(|e| RedubError::Recognition(e.to_string()))?;

        let stem = request
            .audio_path
            .file_stem()
            .ok_or_else(|| RedubError::Recognition("invalid audio filename".into()))?;
        let json_file = output_dir.path().join(format!("{}.json", stem.to_string_lossy()));
        let content = tokio::fs::read_to_string(&json_file)
            .await
            .map_err(|e| RedubError::Recognition(format!("whisper JSON output not found: {}", e)))?;
        let output: WhisperOutput = serde_json::from_str(&content)?;
        debug!("whisper produced {} segments", output.segments.len());

        Ok(WhisperMapper::to_recognition(output, &request.language))
    }
}
