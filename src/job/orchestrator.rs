//! Job orchestration.
//!
//! A job moves QUEUED -> PROCESSING -> {COMPLETED, FAILED}. Each target
//! language runs as its own task, bounded by a shared semaphore; a language
//! failure is recorded on its result and never aborts its siblings. Only a
//! job-level failure (validation, probing, or every language failing) marks
//! the whole job FAILED and notifies.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::model::{JobStatus, TranslationJob};
use super::notify::Notifier;
use super::progress::ProgressTracker;
use super::repository::JobRepository;
use crate::config::Config;
use crate::error::{RedubError, Result};
use crate::pipeline::{LanguagePipeline, LanguageTask, Services, checkpoints};
use crate::storage::StorageKey;

pub struct JobOrchestrator {
    config: Arc<Config>,
    services: Arc<Services>,
    repository: Arc<dyn JobRepository>,
    notifier: Arc<dyn Notifier>,
    pipeline: Arc<LanguagePipeline>,
    permits: Arc<Semaphore>,
}

impl JobOrchestrator {
    pub fn new(
        config: Arc<Config>,
        services: Arc<Services>,
        repository: Arc<dyn JobRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.pipeline.max_concurrent_jobs.max(1)));
        let pipeline = Arc::new(LanguagePipeline::new(services.clone(), config.clone()));
        Self {
            config,
            services,
            repository,
            notifier,
            pipeline,
            permits,
        }
    }

    pub fn repository(&self) -> Arc<dyn JobRepository> {
        self.repository.clone()
    }

    fn validate_input(&self, input: &Path) -> Result<u64> {
        let metadata = std::fs::metadata(input).map_err(|_| RedubError::FileNotFound(input.display().to_string()))?;
        if !metadata.is_file() {
            return Err(RedubError::Validation(format!("{} is not a file", input.display())));
        }
        if metadata.len() == 0 {
            return Err(RedubError::Validation(format!("{} is empty", input.display())));
        }
        let extension = input
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        if !self.config.pipeline.is_supported_format(&extension) {
            return Err(RedubError::UnsupportedFormat(format!(
                "{} (supported: {})",
                input.display(),
                self.config.pipeline.supported_formats.join(", ")
            )));
        }
        Ok(metadata.len())
    }

    /// Validate `input`, create a QUEUED job and store the source video
    pub async fn submit(&self, input: &Path, source_language: &str, target_languages: &[String]) -> Result<TranslationJob> {
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| RedubError::Validation(format!("{} has no file name", input.display())))?;
        self.submit_named(input, &name, source_language, target_languages).await
    }

    /// Like [`submit`](Self::submit), with the job and its storage keys named
    /// by `name` instead of the file name (batch items use their relative path)
    pub async fn submit_named(
        &self,
        input: &Path,
        name: &str,
        source_language: &str,
        target_languages: &[String],
    ) -> Result<TranslationJob> {
        let size = self.validate_input(input)?;
        let mut job = TranslationJob::new(name, source_language, target_languages);
        if job.source_language.is_empty() {
            return Err(RedubError::Validation("source language is empty".to_string()));
        }
        if job.target_languages.is_empty() {
            return Err(RedubError::Validation("no target language given".to_string()));
        }
        self.repository.save(&job).await?;
        info!(
            "Submitted job {} for {} ({} bytes): {} -> [{}]",
            job.id,
            name,
            size,
            job.source_language,
            job.target_languages.join(", ")
        );

        let key = StorageKey::source(&job.id, name);
        match self.services.storage.put_file(&key, input).await {
            Ok(stored) => {
                job.source_key = Some(stored.key);
                self.repository.save(&job).await?;
                Ok(job)
            }
            Err(e) => {
                job.fail(&format!("cannot store source video: {}", e))?;
                self.repository.save(&job).await?;
                self.notify(&job).await;
                Err(e)
            }
        }
    }

    /// Run every target language of a submitted job against the local `input`
    pub async fn run(&self, job_id: Uuid, input: &Path) -> Result<TranslationJob> {
        let job = self
            .repository
            .get(job_id)
            .await?
            .ok_or_else(|| RedubError::Repository(format!("job {} not found", job_id)))?;
        let tracker = Arc::new(ProgressTracker::new(job, self.repository.clone()));
        tracker
            .update(|job| {
                job.start()?;
                job.advance_progress(checkpoints::STARTED);
                Ok(())
            })
            .await?;

        if let Err(e) = self.run_languages(&tracker, input).await {
            error!("Job {} failed: {}", job_id, e);
            let message = e.to_string();
            tracker.update(|job| job.fail(&message)).await?;
        }

        let snapshot = tracker.snapshot().await;
        if snapshot.status == JobStatus::Processing {
            if snapshot.completed_results() > 0 {
                tracker.update(|job| job.complete()).await?;
            } else {
                tracker
                    .update(|job| job.fail("every target language failed"))
                    .await?;
            }
        }

        let job = tracker.snapshot().await;
        match job.status {
            JobStatus::Completed => info!(
                "Job {} completed: {}/{} languages",
                job.id,
                job.completed_results(),
                job.target_languages.len()
            ),
            _ => self.notify(&job).await,
        }
        Ok(job)
    }

    /// Submit and run in one go
    pub async fn process(&self, input: &Path, source_language: &str, target_languages: &[String]) -> Result<TranslationJob> {
        let job = self.submit(input, source_language, target_languages).await?;
        self.run(job.id, input).await
    }

    async fn run_languages(&self, tracker: &Arc<ProgressTracker>, input: &Path) -> Result<()> {
        let duration = self.services.media.probe_duration(input).await?;
        if !(duration > 0.0) {
            return Err(RedubError::Validation(format!(
                "{} has no measurable duration",
                input.display()
            )));
        }
        if duration > self.config.pipeline.max_duration_secs {
            return Err(RedubError::Validation(format!(
                "{:.0}s exceeds the {:.0}s limit",
                duration, self.config.pipeline.max_duration_secs
            )));
        }
        tracker
            .update(|job| {
                job.source_duration = Some(duration);
                Ok(())
            })
            .await?;

        let job = tracker.snapshot().await;
        let stem = job.output_stem();
        let mut handles: Vec<(String, JoinHandle<()>)> = Vec::new();

        for language in &job.target_languages {
            let task = LanguageTask {
                job_id: job.id,
                source_language: job.source_language.clone(),
                target_language: language.clone(),
                video_path: input.to_path_buf(),
                source_duration: duration,
                output_stem: stem.clone(),
            };
            let handle = tokio::spawn(run_language(
                self.pipeline.clone(),
                tracker.clone(),
                self.permits.clone(),
                task,
            ));
            handles.push((language.clone(), handle));
        }

        // every handle is drained so no task outlives the job unrecorded
        for (language, handle) in handles {
            if let Err(e) = handle.await {
                error!("[{}] task aborted: {}", language, e);
                let outcome = Err(RedubError::Tool(format!("{} task aborted: {}", language, e)));
                if let Err(e) = tracker.finish_language(&language, &outcome).await {
                    warn!("[{}] aborted task already had a result: {}", language, e);
                }
            }
        }
        Ok(())
    }

    async fn notify(&self, job: &TranslationJob) {
        if let Err(e) = self.notifier.job_failed(job).await {
            warn!("Failure notification for job {} was not delivered: {}", job.id, e);
        }
    }
}

/// One language from permit to recorded result. The result is created once
/// the permit is held and finished before it is released.
async fn run_language(
    pipeline: Arc<LanguagePipeline>,
    tracker: Arc<ProgressTracker>,
    permits: Arc<Semaphore>,
    task: LanguageTask,
) {
    let language = task.target_language.as_str();
    let permit = permits.acquire_owned().await;
    let outcome = match &permit {
        Ok(_) => match tracker.begin_language(language).await {
            Ok(()) => pipeline.run(&task, tracker.as_ref()).await,
            Err(e) => Err(e),
        },
        Err(e) => Err(RedubError::Config(format!("worker pool closed: {}", e))),
    };
    if let Err(e) = &outcome {
        error!("[{}] language failed: {}", language, e);
    }
    if let Err(e) = tracker.finish_language(language, &outcome).await {
        error!("[{}] result could not be recorded: {}", language, e);
    }
    drop(permit);
}
