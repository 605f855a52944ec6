//! Ordered fallback strategies for a single operation.
//!
//! A ladder holds strategies from most to least ambitious. Each one runs under
//! its own declared timeout; the first success wins and every failure moves on
//! to the next rung. The error only surfaces once the last rung has failed.

use futures::future::BoxFuture;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::error::{Result, RedubError};

type StrategyFn<'a, T> = Box<dyn FnOnce(Duration) -> BoxFuture<'a, Result<T>> + Send + 'a>;

struct Strategy<'a, T> {
    name: String,
    timeout: Duration,
    run: StrategyFn<'a, T>,
}

/// A strategy that did not succeed
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub strategy: String,
    pub error: String,
    pub elapsed: Duration,
}

/// Value produced by the first successful strategy
#[derive(Debug)]
pub struct LadderSuccess<T> {
    pub value: T,
    pub strategy: String,
    pub index: usize,
    pub failures: Vec<AttemptFailure>,
}

pub struct AttemptLadder<'a, T> {
    operation: String,
    strategies: Vec<Strategy<'a, T>>,
}

impl<'a, T: Send + 'a> AttemptLadder<'a, T> {
    pub fn new<S: Into<String>>(operation: S) -> Self {
        Self {
            operation: operation.into(),
            strategies: Vec::new(),
        }
    }

    /// Append a strategy. It receives its own timeout so tool calls inside it
    /// can be bounded by the same value.
    pub fn strategy<S, F, Fut>(mut self, name: S, timeout: Duration, run: F) -> Self
    where
        S: Into<String>,
        F: FnOnce(Duration) -> Fut + Send + 'a,
        Fut: Future<Output = Result<T>> + Send + 'a,
    {
        self.strategies.push(Strategy {
            name: name.into(),
            timeout,
            run: Box::new(move |t| Box::pin(run(t))),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub async fn run(self) -> Result<LadderSuccess<T>> {
        let total = self.strategies.len();
        let mut failures: Vec<AttemptFailure> = Vec::new();

        for (index, strategy) in self.strategies.into_iter().enumerate() {
            let started = Instant::now();
            let outcome = match tokio::time::timeout(strategy.timeout, (strategy.run)(strategy.timeout)).await {
                Ok(result) => result,
                Err(_) => Err(RedubError::ToolTimeout {
                    tool: format!("{} [{}]", self.operation, strategy.name),
                    timeout: strategy.timeout,
                }),
            };

            match outcome {
                Ok(value) => {
                    if index > 0 {
                        info!(
                            "{} succeeded with fallback strategy {}/{} ({})",
                            self.operation,
                            index + 1,
                            total,
                            strategy.name
                        );
                    }
                    return Ok(LadderSuccess {
                        value,
                        strategy: strategy.name,
                        index,
                        failures,
                    });
                }
                Err(e) => {
                    warn!(
                        "{} strategy {}/{} ({}) failed: {}",
                        self.operation,
                        index + 1,
                        total,
                        strategy.name,
                        e
                    );
                    failures.push(AttemptFailure {
                        strategy: strategy.name,
                        error: e.to_string(),
                        elapsed: started.elapsed(),
                    });
                }
            }
        }

        Err(RedubError::LadderExhausted {
            operation: self.operation,
            attempts: failures.len(),
            last_error: failures
                .last()
                .map(|f| f.error.clone())
                .unwrap_or_else(|| "no strategies configured".to_string()),
        })
    }
}
