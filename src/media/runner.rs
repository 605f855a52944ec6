use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Result, RedubError};

/// One fully described external tool call
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub description: String,
    pub timeout: Duration,
}

/// What a finished tool call left behind
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl ToolOutput {
    /// Turn a non-zero exit into a tool failure carrying the tail of stderr.
    pub fn ensure_success(self, description: &str) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        Err(RedubError::Tool(format!(
            "{} exited with {}: {}",
            description,
            self.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()),
            stderr_tail(&self.stderr)
        )))
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(5);
    lines[start..].join(" | ")
}

/// Runs external tools. Every call has a timeout; implementations must
/// terminate the process when it expires.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput>;
}

/// Subprocess runner backed by `tokio::process`
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        debug!(
            "Executing {} ({}): {} {:?}",
            invocation.description,
            invocation.timeout.as_secs(),
            invocation.program,
            invocation.args
        );

        let started = Instant::now();
        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RedubError::Tool(format!("Failed to spawn {}: {}", invocation.program, e)))?;

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let elapsed = started.elapsed();
                debug!("{} finished in {:.1}s", invocation.description, elapsed.as_secs_f64());
                Ok(ToolOutput {
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    elapsed,
                })
            }
            Ok(Err(e)) => Err(RedubError::Tool(format!(
                "Failed waiting for {}: {}",
                invocation.description, e
            ))),
            Err(_) => {
                warn!(
                    "{} exceeded {}s, process killed",
                    invocation.description,
                    invocation.timeout.as_secs()
                );
                Err(RedubError::ToolTimeout {
                    tool: invocation.description.clone(),
                    timeout: invocation.timeout,
                })
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn invocation(program: &str, args: &[&str], timeout: Duration) -> ToolInvocation {
        ToolInvocation {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            description: format!("test {}", program),
            timeout,
        }
    }

    #[tokio::test]
    async fn captures_output_and_status() {
        let runner = ProcessRunner::new();
        let output = runner
            .run(&invocation("sh", &["-c", "echo hello; echo oops >&2"], Duration::from_secs(5)))
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn non_zero_exit_becomes_tool_error() {
        let runner = ProcessRunner::new();
        let output = runner
            .run(&invocation("sh", &["-c", "echo broken >&2; exit 3"], Duration::from_secs(5)))
            .await
            .unwrap();

        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        let err = output.ensure_success("probe").unwrap_err();
        assert!(err.to_string().contains("broken"));
        assert!(err.is_tool_failure());
    }

    #[tokio::test]
    async fn timeout_kills_the_process() {
        let runner = ProcessRunner::new();
        let started = Instant::now();
        let result = runner
            .run(&invocation("sleep", &["10"], Duration::from_millis(200)))
            .await;

        assert!(matches!(result, Err(RedubError::ToolTimeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_binary_is_a_tool_failure() {
        let runner = ProcessRunner::new();
        let result = runner
            .run(&invocation("definitely-not-a-real-binary", &[], Duration::from_secs(1)))
            .await;
        assert!(matches!(result, Err(RedubError::Tool(_))));
    }
}
