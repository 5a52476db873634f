//! Running confirmed scripts in a shell.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use crate::observability::{COMMAND_DURATION, COMMAND_FAILURES, COMMANDS_EXECUTED};

/// Shell used when none is configured.
pub const DEFAULT_SHELL: &str = "sh";

/// Outcome of one script execution.
///
/// Spawn and communication failures are captured in `error` instead of being
/// returned, so the caller always has text to display and feed back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionResult {
    /// Raw standard output.
    pub stdout: String,
    /// Raw standard error.
    pub stderr: String,
    /// Trimmed stdout immediately followed by trimmed stderr.
    pub combined_text: String,
    /// Exit code, if the process ran to completion and was not signalled.
    pub exit_code: Option<i32>,
    /// Failure to spawn or talk to the process.
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Builds a result from captured streams.
    pub fn from_output(stdout: String, stderr: String, exit_code: Option<i32>) -> Self {
        let combined_text = format!("{}{}", stdout.trim(), stderr.trim());
        Self {
            stdout,
            stderr,
            combined_text,
            exit_code,
            error: None,
        }
    }

    /// Builds a result for a process that could not be run.
    pub fn from_error(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            combined_text: error.clone(),
            error: Some(error),
            ..Self::default()
        }
    }

    /// True when the process ran and exited with status zero.
    pub fn success(&self) -> bool {
        self.error.is_none() && self.exit_code == Some(0)
    }
}

/// Something that can run a script.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Runs `script` to completion.
    async fn run(&self, script: &str) -> ExecutionResult;
}

/// Runs scripts as `<shell> -c <script>`.
///
/// The whole script is one invocation, so variables, `cd`, and pipes carry
/// across lines.  stdin stays attached to the terminal.  There is no timeout.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    /// Creates an executor for the given shell program.
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// The shell program used to run scripts.
    pub fn shell(&self) -> &str {
        &self.shell
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL)
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    async fn run(&self, script: &str) -> ExecutionResult {
        COMMANDS_EXECUTED.click();
        let start = Instant::now();
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(script)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;
        COMMAND_DURATION.add(start.elapsed().as_secs_f64());
        match output {
            Ok(output) => {
                let result = ExecutionResult::from_output(
                    String::from_utf8_lossy(&output.stdout).into_owned(),
                    String::from_utf8_lossy(&output.stderr).into_owned(),
                    output.status.code(),
                );
                if !result.success() {
                    COMMAND_FAILURES.click();
                }
                result
            }
            Err(err) => {
                COMMAND_FAILURES.click();
                ExecutionResult::from_error(format!("failed to run {}: {err}", self.shell))
            }
        }
    }
}

/// Executor that records scripts instead of running them.
///
/// Each call returns the next queued result, or an empty successful result
/// once the queue is drained.  Clones share state.
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    scripts: Arc<Mutex<Vec<String>>>,
    results: Arc<Mutex<VecDeque<ExecutionResult>>>,
}

impl RecordingExecutor {
    /// Creates an executor with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the result of a future call whose stdout is `stdout`.
    pub fn push_stdout(&self, stdout: impl Into<String>) -> &Self {
        let result = ExecutionResult::from_output(stdout.into(), String::new(), Some(0));
        lock(&self.results).push_back(result);
        self
    }

    /// Every script received so far.
    pub fn scripts(&self) -> Vec<String> {
        lock(&self.scripts).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn run(&self, script: &str) -> ExecutionResult {
        lock(&self.scripts).push(script.to_string());
        lock(&self.results)
            .pop_front()
            .unwrap_or_else(|| ExecutionResult::from_output(String::new(), String::new(), Some(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stdout_then_stderr_without_separator() {
        let executor = ShellExecutor::default();
        let result = executor.run("echo out; echo err >&2").await;
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert_eq!(result.combined_text, "outerr");
        assert!(result.success());
    }

    #[tokio::test]
    async fn combined_script_shares_shell_state() {
        let executor = ShellExecutor::default();
        let result = executor.run("echo a\necho b").await;
        assert_eq!(result.combined_text, "a\nb");

        let result = executor.run("X=42\necho $X").await;
        assert_eq!(result.combined_text, "42");

        let dir = tempfile::tempdir().unwrap();
        let script = format!("cd {}\npwd | wc -l | tr -d ' '", dir.path().display());
        let result = executor.run(&script).await;
        assert_eq!(result.combined_text, "1");
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let executor = ShellExecutor::default();
        let result = executor.run("echo nope >&2; exit 3").await;
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.combined_text, "nope");
        assert!(result.error.is_none());
        assert!(!result.success());
    }

    #[tokio::test]
    async fn spawn_failure_is_captured() {
        let executor = ShellExecutor::new("/nonexistent/shell-for-chatsh-tests");
        let result = executor.run("echo hi").await;
        assert!(result.error.is_some());
        assert_eq!(result.combined_text, result.error.clone().unwrap());
        assert!(
            result
                .combined_text
                .starts_with("failed to run /nonexistent/shell-for-chatsh-tests")
        );
        assert_eq!(result.exit_code, None);
    }

    #[tokio::test]
    async fn recording_executor_replays_queue() {
        let executor = RecordingExecutor::new();
        executor.push_stdout("file.txt\n");
        let handle = executor.clone();
        assert_eq!(executor.run("ls").await.combined_text, "file.txt");
        assert_eq!(executor.run("pwd").await.combined_text, "");
        assert_eq!(handle.scripts(), vec!["ls", "pwd"]);
    }

    #[test]
    fn runs_outside_an_async_test() {
        let executor = ShellExecutor::default();
        let result = tokio_test::block_on(executor.run("printf '  padded  '"));
        assert_eq!(result.combined_text, "padded");
    }
}
