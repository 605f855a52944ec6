//! Single owner of a running job's record.
//!
//! Language tasks report language-local checkpoints; the tracker folds them
//! into the job's progress (the mean across target languages, never going
//! backwards) and persists every change through the repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use super::model::{LanguageOutput, TranslationJob};
use super::repository::JobRepository;
use crate::error::Result;
use crate::pipeline::ProgressSink;
use crate::pipeline::checkpoints;

struct TrackerState {
    job: TranslationJob,
    checkpoints: HashMap<String, f64>,
}

pub struct ProgressTracker {
    state: Mutex<TrackerState>,
    repository: Arc<dyn JobRepository>,
}

impl ProgressTracker {
    pub fn new(job: TranslationJob, repository: Arc<dyn JobRepository>) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                job,
                checkpoints: HashMap::new(),
            }),
            repository,
        }
    }

    /// Apply `change` to the job and persist it
    pub async fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut TranslationJob) -> Result<()> + Send,
    {
        let mut state = self.state.lock().await;
        change(&mut state.job)?;
        self.repository.save(&state.job).await
    }

    pub async fn snapshot(&self) -> TranslationJob {
        self.state.lock().await.job.clone()
    }

    /// Like [`update`](Self::update), but a failed save is only logged. The
    /// repository stores whole snapshots, so the next save carries the change.
    async fn record<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut TranslationJob) -> Result<()> + Send,
    {
        let mut state = self.state.lock().await;
        change(&mut state.job)?;
        if let Err(e) = self.repository.save(&state.job).await {
            warn!("Could not persist job {}: {}", state.job.id, e);
        }
        Ok(())
    }

    pub async fn begin_language(&self, language: &str) -> Result<()> {
        self.record(|job| job.begin_result(language)).await
    }

    /// Record the language's terminal result and mark it fully progressed.
    /// A language that never got to begin gets its result created here.
    pub async fn finish_language(&self, language: &str, outcome: &Result<LanguageOutput>) -> Result<()> {
        self.record(|job| {
            if job.result(language).is_none() {
                job.begin_result(language)?;
            }
            match outcome {
                Ok(output) => job.complete_result(language, output),
                Err(e) => job.fail_result(language, &e.to_string()),
            }
        })
        .await?;
        self.checkpoint(language, checkpoints::FINISHED).await;
        Ok(())
    }

    fn mean_progress(state: &TrackerState) -> f64 {
        let targets = &state.job.target_languages;
        if targets.is_empty() {
            return 0.0;
        }
        let sum: f64 = targets
            .iter()
            .map(|t| state.checkpoints.get(t).copied().unwrap_or(0.0))
            .sum();
        sum / targets.len() as f64
    }
}

#[async_trait]
impl ProgressSink for ProgressTracker {
    async fn checkpoint(&self, language: &str, percent: f64) {
        let mut state = self.state.lock().await;
        let entry = state.checkpoints.entry(language.to_string()).or_insert(0.0);
        *entry = entry.max(percent);

        let mean = Self::mean_progress(&state);
        if state.job.advance_progress(mean) {
            if let Err(e) = self.repository.save(&state.job).await {
                warn!("Could not persist progress for job {}: {}", state.job.id, e);
            }
        }
    }
}
