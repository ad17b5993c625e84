//! The local executor interface (§6): "given a command string, spawn a
//! child that runs under the system shell, capture stdout and stderr, and
//! expose `waitWithPoll()`, `terminate()`, `exitCode`, `stdoutBytes`,
//! `stderrBytes`." Command construction, shell selection, and pipe capture
//! are concrete here; only the process-management *surface* is abstracted
//! behind [`LocalExecutor`], so the agent's supervisors can be driven
//! against a real subprocess in production and something else in tests.

use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// The outcome of a subprocess, once it has exited or been terminated.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// `None` if the process was killed before it reported an exit code.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutcome {
    #[must_use]
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    #[must_use]
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Spawns shell commands for the agent's per-command supervisors (§4.7).
pub trait LocalExecutor: Send + Sync {
    /// Spawns `command` under the local shell with piped stdout/stderr.
    ///
    /// # Errors
    /// Returns an error if the subprocess cannot be spawned.
    fn spawn(&self, command: &str) -> std::io::Result<SpawnedCommand>;
}

/// A running (or exited) subprocess, plus the tasks draining its pipes.
pub struct SpawnedCommand {
    child: Child,
    stdout: JoinHandle<Vec<u8>>,
    stderr: JoinHandle<Vec<u8>>,
}

impl SpawnedCommand {
    /// Waits for the process to exit on its own (`waitWithPoll`'s blocking
    /// counterpart — callers race this against a deadline with
    /// `tokio::select!` rather than polling in a loop).
    ///
    /// # Errors
    /// Returns an error if waiting on the child fails.
    pub async fn wait(&mut self) -> std::io::Result<std::process::ExitStatus> {
        self.child.wait().await
    }

    /// Best-effort termination (`terminate()`): sends a kill signal and
    /// reaps the process so it doesn't become a zombie. Failures are
    /// swallowed, matching §4.6/§4.7's "best-effort on all exit paths".
    /// Returns the exit code if the process still reported one.
    pub async fn terminate(&mut self) -> Option<i32> {
        drop(self.child.start_kill());
        self.child.wait().await.ok().and_then(|status| status.code())
    }

    /// Consumes this handle, combining `exit_code` (as observed by the
    /// caller's own `wait`/`terminate`) with whatever was captured on
    /// stdout/stderr.
    #[must_use]
    pub async fn into_outcome(self, exit_code: Option<i32>) -> CommandOutcome {
        let stdout = self.stdout.await.unwrap_or_default();
        let stderr = self.stderr.await.unwrap_or_default();
        CommandOutcome {
            exit_code,
            stdout,
            stderr,
        }
    }
}

/// Builds the platform shell invocation for `command`, the way
/// `subprocess.Popen(command, shell=True)` does in the original tool.
fn shell_command(command: &str) -> Command {
    #[cfg(unix)]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
    #[cfg(not(unix))]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
}

/// The production [`LocalExecutor`]: spawns real subprocesses via `tokio`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioExecutor;

impl LocalExecutor for TokioExecutor {
    fn spawn(&self, command: &str) -> std::io::Result<SpawnedCommand> {
        let mut cmd = shell_command(command);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let mut stdout = child.stdout.take().expect("stdout was piped");
        let mut stderr = child.stderr.take().expect("stderr was piped");

        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            drop(stdout.read_to_end(&mut buf).await);
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            drop(stderr.read_to_end(&mut buf).await);
            buf
        });

        Ok(SpawnedCommand {
            child,
            stdout: stdout_task,
            stderr: stderr_task,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_a_command_and_captures_stdout() {
        let executor = TokioExecutor;
        let mut spawned = executor.spawn("echo hello").unwrap();
        let status = spawned.wait().await.unwrap();
        let outcome = spawned.into_outcome(status.code()).await;
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.stdout_string(), "hello\n");
        assert_eq!(outcome.stderr_string(), "");
    }

    #[tokio::test]
    async fn captures_stderr_and_nonzero_exit() {
        let executor = TokioExecutor;
        let mut spawned = executor.spawn("echo oops 1>&2; exit 2").unwrap();
        let status = spawned.wait().await.unwrap();
        let outcome = spawned.into_outcome(status.code()).await;
        assert_eq!(outcome.exit_code, Some(2));
        assert_eq!(outcome.stderr_string(), "oops\n");
    }

    #[tokio::test]
    async fn terminate_kills_a_long_running_process() {
        let executor = TokioExecutor;
        let mut spawned = executor.spawn("sleep 30").unwrap();
        spawned.terminate().await;
        let outcome = spawned.into_outcome(None).await;
        assert_eq!(outcome.exit_code, None);
    }
}
