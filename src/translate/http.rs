// Translation service over HTTP
//
// POST {endpoint}/translate   {text, source_language, target_language} -> {translated_text}
// GET  {endpoint}/languages   -> {pairs: [{source, target}]}

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{LanguagePair, TextTranslator};
use crate::config::TranslationConfig;
use crate::error::{RedubError, Result};
use crate::retry::{RetryPolicy, with_retries};

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    source_language: &'a str,
    target_language: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translated_text: String,
}

#[derive(Debug, Deserialize)]
struct LanguagesResponse {
    #[serde(default)]
    pairs: Vec<LanguagePair>,
}

pub struct HttpTranslator {
    client: Client,
    config: TranslationConfig,
    retry: RetryPolicy,
}

impl HttpTranslator {
    pub fn new(config: TranslationConfig, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("HTTP client creation should not fail");
        Self { client, config, retry }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl TextTranslator for HttpTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let body = &TranslateRequest {
            text,
            source_language: source,
            target_language: target,
        };
        let response: TranslateResponse = with_retries(self.retry, "translate", || async move {
            let response = self
                .authorized(self.client.post(self.url("translate")))
                .json(body)
                .send()
                .await?
                .error_for_status()?;
            Ok(response.json::<TranslateResponse>().await?)
        })
        .await?;

        let translated = response.translated_text.trim().to_string();
        if translated.is_empty() && !text.trim().is_empty() {
            return Err(RedubError::Translation(format!("empty translation for {}-{}", source, target)));
        }
        debug!("translated {} chars {}-{}", text.len(), source, target);
        Ok(translated)
    }

    async fn supported_pairs(&self) -> Result<Vec<LanguagePair>> {
        let response: LanguagesResponse = with_retries(self.retry, "list language pairs", || async move {
            let response = self
                .authorized(self.client.get(self.url("languages")))
                .send()
                .await?
                .error_for_status()?;
            Ok(response.json::<LanguagesResponse>().await?)
        })
        .await?;

        Ok(response
            .pairs
            .into_iter()
            .map(|p| LanguagePair::new(&p.source, &p.target))
            .collect())
    }
}
