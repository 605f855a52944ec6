// Text translation seam
//
// - common: language pairs and names
// - http: translation service (translate, list pairs)
// - ollama: prompted LLM translation with configured direct pairs
// - routing: two-hop routing through the pivot language
// - proper_nouns: placeholder protection for names
// - sentences: sentence splitting for long texts

pub mod common;
pub mod http;
pub mod ollama;
pub mod proper_nouns;
pub mod routing;
pub mod sentences;

use async_trait::async_trait;
use std::sync::Arc;

pub use common::*;
pub use proper_nouns::*;
pub use routing::*;
pub use sentences::*;

use crate::config::{TranslationConfig, TranslatorProvider};
use crate::error::Result;
use crate::retry::RetryPolicy;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextTranslator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;

    /// Pairs the translator handles directly
    async fn supported_pairs(&self) -> Result<Vec<LanguagePair>>;
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    pub fn create_translator(config: TranslationConfig, retry: RetryPolicy) -> Arc<dyn TextTranslator> {
        match config.provider {
            TranslatorProvider::Http => Arc::new(http::HttpTranslator::new(config, retry)),
            TranslatorProvider::Ollama => Arc::new(ollama::OllamaTranslator::new(config, retry)),
        }
    }
}
