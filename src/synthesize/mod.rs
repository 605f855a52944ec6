// Speech synthesis seam
//
// - http: text-to-speech service (synthesize, list voices)
// - voices: voice choice for a chunk, with the optional gender heuristic

pub mod http;
pub mod voices;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub use voices::*;

use crate::config::SynthesisConfig;
use crate::error::Result;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    Female,
    Male,
    #[serde(other)]
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub language: String,
    #[serde(default = "neutral")]
    pub gender: VoiceGender,
    #[serde(default)]
    pub name: Option<String>,
}

fn neutral() -> VoiceGender {
    VoiceGender::Neutral
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` with `voice_id` into `output_path`, returning the bytes written
    async fn synthesize(&self, text: &str, voice_id: &str, output_path: &Path) -> Result<u64>;

    /// Voices available for a language
    async fn voices(&self, language: &str) -> Result<Vec<Voice>>;
}

/// Factory for creating synthesizer instances
pub struct SynthesizerFactory;

impl SynthesizerFactory {
    pub fn create_synthesizer(config: SynthesisConfig, retry: RetryPolicy) -> Arc<dyn SpeechSynthesizer> {
        Arc::new(http::HttpSynthesizer::new(config, retry))
    }
}
