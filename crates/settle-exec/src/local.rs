//! Local command execution using `tokio::process`

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::error::ExecError;
use crate::result::CommandResult;
use crate::traits::CommandExecutor;

/// Shell used to interpret probe commands
const SHELL: &str = "sh";

/// Local command executor
///
/// Executes commands on the local machine through `sh -c`, so probe commands
/// can use pipes and redirections.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    /// Create a new local executor
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    #[instrument(skip(self), level = "debug")]
    async fn run(
        &self,
        cmd: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        // kill_on_drop reaps the child when the timeout drops the output future
        let child = Command::new(SHELL)
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::SpawnError(e.to_string()))?;

        let output = match timeout {
            None => child.wait_with_output().await,
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    warn!(timeout = ?limit, "probe command timed out, killed");
                    return Err(ExecError::Timeout { timeout: limit });
                }
            },
        }
        .map_err(|e| ExecError::IoError(e.to_string()))?;

        // None when killed by a signal
        let result = CommandResult {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: start.elapsed(),
        };
        debug!(status = result.status, duration = ?result.duration, "command completed");

        Ok(result)
    }

    fn executor_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_success() {
        let result = LocalExecutor::new().run("echo ACTIVE", None).await.unwrap();

        assert!(result.success());
        assert_eq!(result.stdout.trim(), "ACTIVE");
    }

    #[tokio::test]
    async fn test_run_failure() {
        let result = LocalExecutor::new().run("exit 42", None).await.unwrap();

        assert!(!result.success());
        assert_eq!(result.status, 42);
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let result = LocalExecutor::new()
            .run("sleep 5", Some(Duration::from_millis(100)))
            .await;

        assert!(matches!(result, Err(ExecError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_run_within_timeout() {
        let result = LocalExecutor::new()
            .run("printf 'IN SERVICE'", Some(Duration::from_secs(5)))
            .await
            .unwrap();

        assert_eq!(result.stdout, "IN SERVICE");
    }

    #[tokio::test]
    async fn test_run_with_stderr() {
        let result = LocalExecutor::new()
            .run("echo missing >&2; exit 3", None)
            .await
            .unwrap();

        assert_eq!(result.status, 3);
        assert_eq!(result.stderr_trimmed(), "missing");
    }
}
