// Text-to-speech service over HTTP
//
// POST {endpoint}/synthesize  {text, voice_id, output_format} -> audio bytes
// GET  {endpoint}/voices?language=xx -> {voices: [...]}

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::{SpeechSynthesizer, Voice};
use crate::config::SynthesisConfig;
use crate::error::{RedubError, Result};
use crate::retry::{RetryPolicy, with_retries};

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    output_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<Voice>,
}

pub struct HttpSynthesizer {
    client: Client,
    config: SynthesisConfig,
    retry: RetryPolicy,
}

impl HttpSynthesizer {
    pub fn new(config: SynthesisConfig, retry: RetryPolicy) -> Self {
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
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str, output_path: &Path) -> Result<u64> {
        let body = &SynthesizeRequest {
            text,
            voice_id,
            output_format: &self.config.output_format,
        };
        let audio: Bytes = with_retries(self.retry, "synthesize", || async move {
            let response = self
                .authorized(self.client.post(self.url("synthesize")))
                .json(body)
                .send()
                .await?
                .error_for_status()?;
            Ok(response.bytes().await?)
        })
        .await?;

        if audio.is_empty() {
            return Err(RedubError::Synthesis(format!("voice {} returned no audio", voice_id)));
        }
        tokio::fs::write(output_path, &audio).await?;
        debug!("synthesized {} bytes with voice {}", audio.len(), voice_id);
        Ok(audio.len() as u64)
    }

    async fn voices(&self, language: &str) -> Result<Vec<Voice>> {
        let response: VoicesResponse = with_retries(self.retry, "list voices", || async move {
            let response = self
                .authorized(self.client.get(self.url("voices")))
                .query(&[("language", language)])
                .send()
                .await?
                .error_for_status()?;
            Ok(response.json::<VoicesResponse>().await?)
        })
        .await?;
        Ok(response.voices)
    }
}
