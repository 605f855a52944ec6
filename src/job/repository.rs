use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::model::{JobStatus, TranslationJob};
use crate::error::{RedubError, Result};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert or replace the stored job
    async fn save(&self, job: &TranslationJob) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<TranslationJob>>;

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<TranslationJob>>;
}

#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<Uuid, TranslationJob>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn save(&self, job: &TranslationJob) -> Result<()> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TranslationJob>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<TranslationJob>> {
        let mut jobs: Vec<TranslationJob> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }
}

/// One pretty-printed JSON document per job under a directory
pub struct JsonFileJobRepository {
    dir: PathBuf,
}

impl JsonFileJobRepository {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl JobRepository for JsonFileJobRepository {
    async fn save(&self, job: &TranslationJob) -> Result<()> {
        let content = serde_json::to_string_pretty(job)?;
        let path = self.path_for(job.id);
        // write then rename so readers never see a half-written file
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, content).await?;
        tokio::fs::rename(&staging, &path).await?;
        debug!("saved job {} ({}, {:.0}%)", job.id, job.status, job.progress);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TranslationJob>> {
        let path = self.path_for(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RedubError::Repository(format!("cannot read {}: {}", path.display(), e))),
        }
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<TranslationJob>> {
        let mut jobs = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let content = tokio::fs::read_to_string(&path).await?;
                let job: TranslationJob = serde_json::from_str(&content)?;
                if job.status == status {
                    jobs.push(job);
                }
            }
        }
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }
}
