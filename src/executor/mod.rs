//! Command execution layer.
//!
//! The engine never talks to a device directly — it consumes a single
//! capability: run one command line, get its output back or fail. The
//! [`Executor`] trait abstracts that capability so the snapshot and version
//! managers can be wired to any transport.
//!
//! A non-zero exit code is *not* an `Err`: it comes back as a
//! [`CommandResult`] with [`CommandStatus::Failed`] so the caller can decide
//! whether the rejection is fatal (a `set` during restore) or recoverable.
//! `Err` is reserved for transport problems — launch failures, timeouts,
//! unreachable devices — which the retry policy treats as transient.
//!
//! # Implementations
//!
//! - [`LocalExecutor`]: runs commands through `sh -c` on the current host
//! - [`ScriptedExecutor`]: canned responses for tests and dry wiring

/// Local command execution implementation.
pub mod local;

/// Retry policies with configurable backoff.
pub mod retry;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use local::LocalExecutor;
pub use retry::{BackoffStrategy, JitterStrategy, RetryError, RetryPolicy};

/// Errors that can occur at the transport level.
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// The command could not be launched at all.
    #[error("Failed to launch command '{command}': {message}")]
    Launch {
        /// The command line
        command: String,
        /// Launch failure reason
        message: String,
    },

    /// The command did not complete within the timeout.
    #[error("Command '{command}' timed out after {timeout_secs} seconds")]
    Timeout {
        /// The command line
        command: String,
        /// Timeout in seconds
        timeout_secs: u64,
    },

    /// The transport to the device failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O error while reading command output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for executor operations.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Outcome classification of a completed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    /// Exit code zero.
    Success,
    /// Non-zero exit code.
    Failed,
    /// The command timed out.
    Timeout,
    /// Transport-level failure.
    Error,
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandStatus::Success => write!(f, "success"),
            CommandStatus::Failed => write!(f, "failed"),
            CommandStatus::Timeout => write!(f, "timeout"),
            CommandStatus::Error => write!(f, "error"),
        }
    }
}

/// The result of executing a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Outcome classification.
    pub status: CommandStatus,
    /// Content written to standard output.
    pub stdout: String,
    /// Content written to standard error.
    pub stderr: String,
    /// Exit code (0 indicates success).
    pub exit_code: i32,
    /// The command that was executed.
    pub command: String,
    /// Wall-clock execution time.
    pub execution_time: Duration,
    /// Number of retries it took to get this result.
    pub retry_count: u32,
}

impl CommandResult {
    /// Creates a successful result.
    pub fn success(command: impl Into<String>, stdout: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Success,
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
            command: command.into(),
            execution_time: Duration::ZERO,
            retry_count: 0,
        }
    }

    /// Creates a failed result.
    pub fn failure(command: impl Into<String>, exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Failed,
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
            command: command.into(),
            execution_time: Duration::ZERO,
            retry_count: 0,
        }
    }

    /// Returns true if the command succeeded.
    pub fn is_success(&self) -> bool {
        self.status == CommandStatus::Success
    }

    /// The most useful error text: stderr if present, else stdout, else the
    /// exit code.
    pub fn error_message(&self) -> String {
        if !self.stderr.is_empty() {
            self.stderr.clone()
        } else if !self.stdout.is_empty() {
            self.stdout.clone()
        } else {
            format!("exit code {}", self.exit_code)
        }
    }
}

/// The single capability the engine consumes: run one command line against
/// the managed device and return its output, or fail.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Executes a command with a timeout.
    async fn execute(&self, command: &str, timeout: Duration) -> ExecutorResult<CommandResult>;

    /// Identifier for logging (hostname, container id, ...).
    fn name(&self) -> &str {
        "executor"
    }
}

/// The device command dialect: which command lines drive configuration
/// sessions. Configurable so the engine is not welded to one vendor CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSet {
    /// Dumps the running configuration as one statement per line.
    pub show_config: String,
    /// Reports device/software version as `key: value` lines.
    pub show_version: String,
    /// Enters configuration mode.
    pub enter_config: String,
    /// Commits the pending transaction.
    pub commit: String,
    /// Discards the pending transaction.
    pub discard: String,
    /// Leaves configuration mode.
    pub exit_config: String,
    /// Persists the committed configuration.
    pub save: String,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self {
            show_config: "show configuration commands".to_string(),
            show_version: "show version".to_string(),
            enter_config: "configure".to_string(),
            commit: "commit".to_string(),
            discard: "discard".to_string(),
            exit_config: "exit".to_string(),
            save: "save".to_string(),
        }
    }
}

// ============================================================================
// Scripted executor (test double)
// ============================================================================

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Prefix(String),
}

impl Matcher {
    fn matches(&self, command: &str) -> bool {
        match self {
            Matcher::Exact(exact) => exact == command,
            Matcher::Prefix(prefix) => command.starts_with(prefix.as_str()),
        }
    }
}

#[derive(Debug, Clone)]
enum Canned {
    Result {
        stdout: String,
        stderr: String,
        exit_code: i32,
    },
    Unreachable,
}

#[derive(Debug, Default)]
struct ScriptedState {
    rules: Vec<(Matcher, Canned)>,
    history: Vec<String>,
}

/// Executor returning canned responses, recording every command it is asked
/// to run. Commands with no matching rule succeed with empty output; when
/// several rules match, the most recently added one wins, so a device can be
/// re-scripted between captures.
///
/// Clones share state, so a copy kept outside an `Arc<dyn Executor>` can
/// still inspect [`ScriptedExecutor::history`] afterwards.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecutor {
    inner: Arc<Mutex<ScriptedState>>,
}

impl ScriptedExecutor {
    /// Creates a scripted executor where every command succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Responds to an exact command with the given stdout.
    pub fn respond(self, command: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.inner.lock().rules.insert(
            0,
            (
                Matcher::Exact(command.into()),
                Canned::Result {
                    stdout: stdout.into(),
                    stderr: String::new(),
                    exit_code: 0,
                },
            ),
        );
        self
    }

    /// Fails (exit 1) every command starting with the given prefix.
    pub fn fail(self, prefix: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.inner.lock().rules.insert(
            0,
            (
                Matcher::Prefix(prefix.into()),
                Canned::Result {
                    stdout: String::new(),
                    stderr: stderr.into(),
                    exit_code: 1,
                },
            ),
        );
        self
    }

    /// Makes every command starting with the given prefix fail at the
    /// transport level (an `Err`, retried by the retry policy).
    pub fn unreachable(self, prefix: impl Into<String>) -> Self {
        self.inner
            .lock()
            .rules
            .insert(0, (Matcher::Prefix(prefix.into()), Canned::Unreachable));
        self
    }

    /// Every command executed so far, in order.
    pub fn history(&self) -> Vec<String> {
        self.inner.lock().history.clone()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn execute(&self, command: &str, _timeout: Duration) -> ExecutorResult<CommandResult> {
        let start = Instant::now();
        let canned = {
            let mut state = self.inner.lock();
            state.history.push(command.to_string());
            state
                .rules
                .iter()
                .find(|(matcher, _)| matcher.matches(command))
                .map(|(_, canned)| canned.clone())
        };

        match canned {
            Some(Canned::Unreachable) => Err(ExecutorError::Transport(format!(
                "device unreachable for '{command}'"
            ))),
            Some(Canned::Result {
                stdout,
                stderr,
                exit_code,
            }) => Ok(CommandResult {
                status: if exit_code == 0 {
                    CommandStatus::Success
                } else {
                    CommandStatus::Failed
                },
                stdout,
                stderr,
                exit_code,
                command: command.to_string(),
                execution_time: start.elapsed(),
                retry_count: 0,
            }),
            None => Ok(CommandResult::success(command, "")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_executor_default_success() {
        let executor = ScriptedExecutor::new();
        let result = executor
            .execute("show version", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(executor.history(), vec!["show version"]);
    }

    #[tokio::test]
    async fn test_scripted_executor_canned_and_failing() {
        let executor = ScriptedExecutor::new()
            .respond("show configuration commands", "set system host-name r1")
            .fail("set firewall", "invalid rule");

        let show = executor
            .execute("show configuration commands", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(show.stdout, "set system host-name r1");

        let set = executor
            .execute("set firewall name in rule 10", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(set.status, CommandStatus::Failed);
        assert_eq!(set.error_message(), "invalid rule");
    }

    #[tokio::test]
    async fn test_scripted_executor_unreachable() {
        let executor = ScriptedExecutor::new().unreachable("show");
        let err = executor
            .execute("show version", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Transport(_)));
    }

    #[test]
    fn test_command_set_default() {
        let commands = CommandSet::default();
        assert_eq!(commands.show_config, "show configuration commands");
        assert_eq!(commands.enter_config, "configure");
    }
}
