// Ollama LLM translator
//
// Prompts the model for a JSON object {"text": "..."} and falls back to
// scraping the first plausible line when the model ignores the format.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::{LanguagePair, TextTranslator, language_code_to_name};
use crate::config::TranslationConfig;
use crate::error::{RedubError, Result};
use crate::retry::{RetryPolicy, with_retries};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TranslatedText {
    text: String,
}

pub struct OllamaTranslator {
    client: Client,
    config: TranslationConfig,
    retry: RetryPolicy,
}

impl OllamaTranslator {
    pub fn new(config: TranslationConfig, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("HTTP client creation should not fail");
        Self { client, config, retry }
    }

    fn build_prompt(&self, text: &str, source: &str, target: &str) -> String {
        let source_name = language_code_to_name(source);
        let target_name = language_code_to_name(target);
        format!(
            "You are a professional translator for spoken narration.\n\
             \n\
             CRITICAL: Translate the text from {} to {} ONLY. Do not translate to any other language.\n\
             The target language is: {} (language code: {})\n\
             Tokens like __PN0__ are names: copy them unchanged.\n\
             \n\
             Return ONLY the translation in JSON format as {{\"text\":\"your {} translation here\"}}.\n\
             Do not include any explanations, alternatives, or text in other languages.\n\
             \n\
             [Text to translate]\n\
             {}\n",
            source_name, target_name, target_name, target, target_name, text
        )
    }
}

/// Pull the translation out of a model reply that ignored the JSON format
fn clean_translation_response(response: &str) -> String {
    let skip = |line: &str| {
        line.starts_with("Here are")
            || line.starts_with("Option")
            || line.starts_with("**Option")
            || line.starts_with("Translation:")
            || line.starts_with("- ")
            || line.starts_with("* ")
            || (line.starts_with("**") && line.ends_with("**"))
    };

    response
        .lines()
        .map(str::trim)
        .find(|line| line.chars().count() > 3 && !skip(line))
        .or_else(|| response.lines().map(str::trim).find(|line| !line.is_empty()))
        .unwrap_or(response)
        .to_string()
}

#[async_trait]
impl TextTranslator for OllamaTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let request = &GenerateRequest {
            model: self.config.model.clone(),
            prompt: self.build_prompt(text, source, target),
            stream: false,
            format: "json".to_string(),
        };
        let url = &format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        debug!("Sending translation request to: {}", url);

        let reply: GenerateResponse = with_retries(self.retry, "ollama translate", || async move {
            let response = self.client.post(url).json(request).send().await?.error_for_status()?;
            Ok(response.json::<GenerateResponse>().await?)
        })
        .await?;

        let raw = reply.response.trim();
        if raw.is_empty() {
            return Err(RedubError::Translation("Empty translation received".to_string()));
        }
        if let Ok(parsed) = serde_json::from_str::<TranslatedText>(raw) {
            return Ok(parsed.text.trim().to_string());
        }
        warn!("model reply was not the requested JSON, extracting text");
        Ok(clean_translation_response(raw))
    }

    async fn supported_pairs(&self) -> Result<Vec<LanguagePair>> {
        Ok(self
            .config
            .direct_pairs
            .iter()
            .filter_map(|p| LanguagePair::parse(p))
            .collect())
    }
}
