//! Handle to a running worker process.

use super::{LaunchSpec, WorkerError};
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

/// Result of terminating a worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminationReport {
    /// OS process id, if it was known.
    pub pid: Option<u32>,
    /// Exit code, if the worker exited with one.
    pub exit_code: Option<i32>,
    /// Whether the worker had to be killed after the grace period.
    pub killed: bool,
}

/// A running worker process with its input and output channels.
///
/// Exclusively owned by one stage. The process is killed if the handle is
/// dropped while it is still running.
#[derive(Debug)]
pub struct WorkerHandle {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    pid: Option<u32>,
}

impl WorkerHandle {
    /// Spawns the worker described by `spec`.
    ///
    /// Standard error is forwarded line by line to the log under `stage`.
    pub fn spawn(spec: &LaunchSpec, stage: &str) -> Result<Self, WorkerError> {
        let mut child = Command::new(&spec.executable)
            .args(&spec.args)
            .current_dir(&spec.current_dir)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(WorkerError::Spawn)?;

        let pid = child.id();
        let stdin = child.stdin.take().ok_or(WorkerError::Closed)?;
        let stdout = child.stdout.take().ok_or(WorkerError::Closed)?;

        if let Some(stderr) = child.stderr.take() {
            let stage = stage.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(stage = %stage, pid = ?pid, "worker stderr: {}", line);
                }
            });
        }

        debug!(
            stage = %stage,
            pid = ?pid,
            executable = %spec.executable.display(),
            args = ?spec.args,
            "Spawned worker"
        );

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            pid,
        })
    }

    /// Returns the OS process id.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Returns the exit code if the worker has already exited.
    pub fn try_exit_code(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.code().unwrap_or(-1)),
            _ => None,
        }
    }

    /// Writes one line followed by a newline and flushes it.
    pub async fn send_line(&mut self, line: &str) -> Result<(), WorkerError> {
        let stdin = self.stdin.as_mut().ok_or(WorkerError::Closed)?;

        let mut framed = String::with_capacity(line.len() + 1);
        framed.push_str(line);
        framed.push('\n');

        let result = async {
            stdin.write_all(framed.as_bytes()).await?;
            stdin.flush().await
        }
        .await;

        result.map_err(|e| match e.kind() {
            ErrorKind::BrokenPipe => WorkerError::Closed,
            _ => WorkerError::Io(e),
        })
    }

    /// Reads one line, without its separator.
    ///
    /// Returns `Ok(None)` at end of stream.
    pub async fn read_line(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, WorkerError> {
        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.stdout.next_line())
                .await
                .map_err(|_| WorkerError::TimedOut(limit))?,
            None => self.stdout.next_line().await,
        };

        result.map_err(|e| match e.kind() {
            ErrorKind::InvalidData => WorkerError::InvalidUtf8,
            _ => WorkerError::Io(e),
        })
    }

    /// Stops the worker.
    ///
    /// Closes its input so a well-behaved worker can exit on its own, waits
    /// up to `grace`, then kills it. Never fails.
    pub async fn terminate(mut self, grace: Duration) -> TerminationReport {
        let mut report = TerminationReport {
            pid: self.pid,
            ..TerminationReport::default()
        };

        drop(self.stdin.take());

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                report.exit_code = status.code();
            }
            Ok(Err(e)) => {
                warn!(pid = ?self.pid, error = %e, "Failed to wait for worker");
            }
            Err(_) => {
                debug!(pid = ?self.pid, ?grace, "Worker did not exit in time, killing");
                if let Err(e) = self.child.kill().await {
                    warn!(pid = ?self.pid, error = %e, "Failed to kill worker");
                }
                report.killed = true;
            }
        }

        report
    }
}
