use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Tool invocation failed: {0}")]
    Tool(String),

    #[error("{tool} timed out after {}s", .timeout.as_secs())]
    ToolTimeout { tool: String, timeout: Duration },

    #[error("All {attempts} strategies failed for {operation}: {last_error}")]
    LadderExhausted {
        operation: String,
        attempts: usize,
        last_error: String,
    },

    #[error("Speech recognition error: {0}")]
    Recognition(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl From<object_store::Error> for RedubError {
    fn from(e: object_store::Error) -> Self {
        RedubError::Storage(e.to_string())
    }
}

impl RedubError {
    /// Tool failures are the ones a fallback ladder may escalate past.
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            RedubError::Tool(_) | RedubError::ToolTimeout { .. } | RedubError::LadderExhausted { .. }
        )
    }

    /// Validation failures fail fast and are never retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RedubError::Validation(_) | RedubError::UnsupportedFormat(_) | RedubError::FileNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RedubError>;
