use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::chunking::ChunkFallback;
use crate::error::{RedubError, Result};
use crate::media::MuxStrategy;
use crate::storage::{StorageKey, StoredObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(JobStatus::Queued),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    Processing,
    Completed,
    Failed,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Processing => "PROCESSING",
            ResultStatus::Completed => "COMPLETED",
            ResultStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How closely an output's duration tracks its reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncQuality {
    /// Within 5%
    Good,
    /// Within 10%
    Acceptable,
    Poor,
}

impl SyncQuality {
    pub fn classify(actual: f64, expected: f64) -> Self {
        if expected <= 0.0 {
            return SyncQuality::Poor;
        }
        let deviation = (actual - expected).abs() / expected;
        if deviation <= 0.05 {
            SyncQuality::Good
        } else if deviation <= 0.10 {
            SyncQuality::Acceptable
        } else {
            SyncQuality::Poor
        }
    }
}

impl fmt::Display for SyncQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncQuality::Good => "good",
            SyncQuality::Acceptable => "acceptable",
            SyncQuality::Poor => "poor",
        };
        f.write_str(label)
    }
}

/// What a successful language run produced
#[derive(Debug, Clone)]
pub struct LanguageOutput {
    pub stored: StoredObject,
    pub total_chunks: usize,
    pub failed_chunks: usize,
    pub chunk_fallback: ChunkFallback,
    pub mux_strategy: MuxStrategy,
    pub sync_quality: SyncQuality,
    pub output_duration: f64,
}

impl LanguageOutput {
    pub fn is_degraded(&self) -> bool {
        self.failed_chunks > 0 || self.chunk_fallback != ChunkFallback::None || self.mux_strategy.is_passthrough()
    }
}

/// Outcome of one target language within a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    pub language: String,
    pub status: ResultStatus,
    pub output_key: Option<StorageKey>,
    pub output_size: Option<u64>,
    pub backend: Option<String>,
    pub processing_secs: Option<f64>,
    pub error_message: Option<String>,
    pub degraded: bool,
    pub total_chunks: usize,
    pub failed_chunks: usize,
    pub sync_quality: Option<SyncQuality>,
    pub mux_strategy: Option<MuxStrategy>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TranslationResult {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            status: ResultStatus::Processing,
            output_key: None,
            output_size: None,
            backend: None,
            processing_secs: None,
            error_message: None,
            degraded: false,
            total_chunks: 0,
            failed_chunks: 0,
            sync_quality: None,
            mux_strategy: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != ResultStatus::Processing
    }

    fn finish(&mut self, status: ResultStatus) -> Result<()> {
        if self.is_terminal() {
            return Err(RedubError::InvalidTransition(format!(
                "result for {} is already {}",
                self.language, self.status
            )));
        }
        let now = Utc::now();
        self.status = status;
        self.processing_secs = Some((now - self.started_at).num_milliseconds() as f64 / 1000.0);
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn complete(&mut self, output: &LanguageOutput) -> Result<()> {
        self.finish(ResultStatus::Completed)?;
        self.output_key = Some(output.stored.key.clone());
        self.output_size = Some(output.stored.size);
        self.backend = Some(output.stored.backend.clone());
        self.degraded = output.is_degraded();
        self.total_chunks = output.total_chunks;
        self.failed_chunks = output.failed_chunks;
        self.sync_quality = Some(output.sync_quality);
        self.mux_strategy = Some(output.mux_strategy);
        Ok(())
    }

    pub fn fail(&mut self, message: &str) -> Result<()> {
        self.finish(ResultStatus::Failed)?;
        self.error_message = Some(message.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationJob {
    pub id: Uuid,
    pub original_filename: String,
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub status: JobStatus,
    pub progress: f64,
    pub results: Vec<TranslationResult>,
    pub source_key: Option<StorageKey>,
    pub source_duration: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TranslationJob {
    /// Targets are trimmed and deduplicated, first occurrence wins
    pub fn new(original_filename: &str, source_language: &str, target_languages: &[String]) -> Self {
        let mut targets: Vec<String> = Vec::new();
        for language in target_languages {
            let language = language.trim();
            if !language.is_empty() && !targets.iter().any(|t| t == language) {
                targets.push(language.to_string());
            }
        }

        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            original_filename: original_filename.to_string(),
            source_language: source_language.trim().to_string(),
            target_languages: targets,
            status: JobStatus::Queued,
            progress: 0.0,
            results: Vec::new(),
            source_key: None,
            source_duration: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn start(&mut self) -> Result<()> {
        if self.status != JobStatus::Queued {
            return Err(RedubError::InvalidTransition(format!(
                "job {} cannot start from {}",
                self.id, self.status
            )));
        }
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Raise progress to `percent`; lower values are ignored. Returns whether it moved.
    pub fn advance_progress(&mut self, percent: f64) -> bool {
        let percent = percent.clamp(0.0, 100.0);
        if percent <= self.progress {
            return false;
        }
        self.progress = percent;
        self.touch();
        true
    }

    pub fn result(&self, language: &str) -> Option<&TranslationResult> {
        self.results.iter().find(|r| r.language == language)
    }

    fn result_mut(&mut self, language: &str) -> Result<&mut TranslationResult> {
        let id = self.id;
        self.results
            .iter_mut()
            .find(|r| r.language == language)
            .ok_or_else(|| RedubError::InvalidTransition(format!("job {} has no result for {}", id, language)))
    }

    /// Append a PROCESSING result for `language`
    pub fn begin_result(&mut self, language: &str) -> Result<()> {
        if self.result(language).is_some() {
            return Err(RedubError::InvalidTransition(format!(
                "job {} already has a result for {}",
                self.id, language
            )));
        }
        self.results.push(TranslationResult::new(language));
        self.touch();
        Ok(())
    }

    pub fn complete_result(&mut self, language: &str, output: &LanguageOutput) -> Result<()> {
        self.result_mut(language)?.complete(output)?;
        self.touch();
        Ok(())
    }

    pub fn fail_result(&mut self, language: &str, message: &str) -> Result<()> {
        self.result_mut(language)?.fail(message)?;
        self.touch();
        Ok(())
    }

    pub fn completed_results(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ResultStatus::Completed)
            .count()
    }

    /// PROCESSING -> COMPLETED; needs at least one completed language
    pub fn complete(&mut self) -> Result<()> {
        if self.status != JobStatus::Processing {
            return Err(RedubError::InvalidTransition(format!(
                "job {} cannot complete from {}",
                self.id, self.status
            )));
        }
        if self.completed_results() == 0 {
            return Err(RedubError::InvalidTransition(format!(
                "job {} has no completed language",
                self.id
            )));
        }
        self.status = JobStatus::Completed;
        self.advance_progress(100.0);
        self.completed_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    pub fn fail(&mut self, message: &str) -> Result<()> {
        if self.status.is_terminal() {
            return Err(RedubError::InvalidTransition(format!(
                "job {} is already {}",
                self.id, self.status
            )));
        }
        self.status = JobStatus::Failed;
        self.error_message = Some(message.to_string());
        self.completed_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Output filename stem shared by every language
    pub fn output_stem(&self) -> String {
        std::path::Path::new(&self.original_filename)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.id.to_string())
    }
}
