use async_trait::async_trait;
use tracing::error;

use super::model::TranslationJob;
use crate::error::Result;

/// Told when a whole job fails. Delivery (mail, chat, ...) lives outside the pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn job_failed(&self, job: &TranslationJob) -> Result<()>;
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn job_failed(&self, job: &TranslationJob) -> Result<()> {
        let failed: Vec<String> = job
            .results
            .iter()
            .filter_map(|r| r.error_message.as_ref().map(|e| format!("{}: {}", r.language, e)))
            .collect();
        error!(
            job_id = %job.id,
            file = %job.original_filename,
            "Translation job failed: {} [{}]",
            job.error_message.as_deref().unwrap_or("unknown error"),
            failed.join("; ")
        );
        Ok(())
    }
}
