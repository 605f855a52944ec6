// Recognition job service over HTTP
//
// Flow: submit a job naming the uploaded chunk's URI, poll its status at a
// fixed interval, then fetch the transcript document it points to.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::common::{Recognition, ServiceTranscript, ServiceTranscriptMapper, TranscriptMapper};
use super::{RecognitionRequest, SpeechRecognizer};
use crate::config::RecognitionConfig;
use crate::error::{RedubError, Result};
use crate::retry::{RetryPolicy, with_retries};

#[derive(Debug, Serialize)]
struct SubmitJobRequest<'a> {
    job_name: &'a str,
    media_uri: &'a str,
    language_code: &'a str,
    settings: JobSettings,
}

#[derive(Debug, Serialize)]
struct JobSettings {
    show_alternatives: bool,
    max_alternatives: u32,
    show_speaker_labels: bool,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    status: JobState,
    #[serde(default)]
    transcript_uri: Option<String>,
    #[serde(default)]
    failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum JobState {
    Queued,
    InProgress,
    Completed,
    Failed,
}

pub struct HttpRecognizer {
    client: Client,
    config: RecognitionConfig,
    retry: RetryPolicy,
}

impl HttpRecognizer {
    pub fn new(config: RecognitionConfig, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
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

    async fn submit(&self, job_name: &str, media_uri: &str, language: &str) -> Result<()> {
        let body = SubmitJobRequest {
            job_name,
            media_uri,
            language_code: language,
            settings: JobSettings {
                show_alternatives: self.config.max_alternatives > 1,
                max_alternatives: self.config.max_alternatives,
                show_speaker_labels: self.config.show_speaker_labels,
            },
        };
        let body = &body;
        with_retries(self.retry, "recognition submit", || async move {
            self.authorized(self.client.post(self.url("jobs")))
                .json(body)
                .send()
                .await?
                .error_for_status()?;
            Ok(())
        })
        .await?;
        debug!("submitted recognition job {}", job_name);
        Ok(())
    }

    async fn status(&self, job_name: &str) -> Result<JobStatusResponse> {
        with_retries(self.retry, "recognition status", || async move {
            let response = self
                .authorized(self.client.get(self.url(&format!("jobs/{}", job_name))))
                .send()
                .await?
                .error_for_status()?;
            Ok(response.json::<JobStatusResponse>().await?)
        })
        .await
    }

    /// Poll until the job settles, returning the transcript location
    async fn wait_for_transcript(&self, job_name: &str) -> Result<String> {
        let interval = Duration::from_secs(self.config.poll_interval_secs);
        for attempt in 1..=self.config.max_poll_attempts {
            let status = self.status(job_name).await?;
            match status.status {
                JobState::Completed => {
                    return status.transcript_uri.ok_or_else(|| {
                        RedubError::Recognition(format!("job {} completed without a transcript", job_name))
                    });
                }
                JobState::Failed => {
                    return Err(RedubError::Recognition(format!(
                        "job {} failed: {}",
                        job_name,
                        status.failure_reason.unwrap_or_else(|| "no reason given".to_string())
                    )));
                }
                JobState::Queued | JobState::InProgress => {
                    debug!("recognition job {} still running (poll {})", job_name, attempt);
                    tokio::time::sleep(interval).await;
                }
            }
        }
        Err(RedubError::Recognition(format!(
            "job {} did not complete after {} polls",
            job_name, self.config.max_poll_attempts
        )))
    }

    async fn fetch_transcript(&self, uri: &str) -> Result<ServiceTranscript> {
        with_retries(self.retry, "transcript fetch", || async move {
            let response = self.authorized(self.client.get(uri)).send().await?.error_for_status()?;
            Ok(response.json::<ServiceTranscript>().await?)
        })
        .await
    }
}

#[async_trait]
impl SpeechRecognizer for HttpRecognizer {
    async fn recognize(&self, request: &RecognitionRequest) -> Result<Recognition> {
        let media_uri = request.media_uri.as_deref().ok_or_else(|| {
            RedubError::Recognition(format!("chunk {} has no storage URI to submit", request.chunk_index))
        })?;

        self.submit(&request.job_name, media_uri, &request.language).await?;
        let transcript_uri = self.wait_for_transcript(&request.job_name).await?;
        let transcript = self.fetch_transcript(&transcript_uri).await?;
        let recognition = ServiceTranscriptMapper::to_recognition(transcript, &request.language);

        info!(
            "recognition job {} returned {} candidate(s), {} speaker(s)",
            request.job_name,
            recognition.candidates.len(),
            recognition.speaker_count
        );
        Ok(recognition)
    }
}
