use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::PipelineConfig;
use crate::error::{RedubError, Result};

/// How often and how patiently a remote call is repeated
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl From<&PipelineConfig> for RetryPolicy {
    fn from(config: &PipelineConfig) -> Self {
        Self::new(config.retry_attempts, config.retry_delay())
    }
}

/// Only transport-level failures are worth repeating. Anything the remote
/// service answered deliberately, and any validation failure, surfaces at once.
fn is_transient(error: &RedubError) -> bool {
    match error {
        RedubError::Http(e) => !e.status().is_some_and(|s| s.is_client_error()),
        _ => false,
    }
}

/// Run `operation` until it succeeds, fails permanently or runs out of attempts
pub async fn with_retries<T, F, Fut>(policy: RetryPolicy, name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.attempts && is_transient(&e) => {
                warn!("{} failed (attempt {}/{}): {}", name, attempt, policy.attempts, e);
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
