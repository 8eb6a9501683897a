//! Local executor.
//!
//! Runs commands through `sh -c` on the current host without any network
//! transport. Useful for demos, CI, and managing a device the process runs
//! on directly.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{CommandResult, CommandStatus, Executor, ExecutorError, ExecutorResult};

/// Executes commands on the local host via `sh -c`.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    identifier: String,
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalExecutor {
    /// Creates a new local executor.
    pub fn new() -> Self {
        Self {
            identifier: "localhost".to_string(),
        }
    }

    /// Creates a local executor with a custom identifier for logging.
    pub fn with_identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(&self, command: &str, timeout: Duration) -> ExecutorResult<CommandResult> {
        let start = Instant::now();
        debug!(command, "executing local command");

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutorError::Launch {
                command: command.to_string(),
                message: e.to_string(),
            })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ExecutorError::Timeout {
                    command: command.to_string(),
                    timeout_secs: timeout.as_secs(),
                })
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout)
            .trim_end()
            .to_string();
        let stderr = String::from_utf8_lossy(&output.stderr)
            .trim_end()
            .to_string();

        let status = if exit_code == 0 {
            CommandStatus::Success
        } else {
            CommandStatus::Failed
        };

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            exit_code,
            command: command.to_string(),
            execution_time: start.elapsed(),
            retry_count: 0,
        })
    }

    fn name(&self) -> &str {
        &self.identifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_execute_success() {
        let executor = LocalExecutor::new();
        let result = executor
            .execute("echo hello", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.stdout, "hello");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_local_execute_nonzero_exit_is_failed_result() {
        let executor = LocalExecutor::new();
        let result = executor
            .execute("exit 3", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.status, CommandStatus::Failed);
        assert_eq!(result.exit_code, 3);
    }

    #[tokio::test]
    async fn test_local_execute_timeout() {
        let executor = LocalExecutor::new();
        let err = executor
            .execute("sleep 5", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Timeout { .. }));
    }
}
