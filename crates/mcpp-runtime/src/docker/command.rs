//! Thin wrapper around the docker CLI.
//!
//! Every invocation runs with a timeout and `kill_on_drop`, so a hung
//! runtime can never block the caller indefinitely.

use std::process::Stdio;
use std::time::Duration;

use mcpp_core::BackendError;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Captured output of one CLI invocation.
#[derive(Debug, Clone, Default)]
pub(crate) struct CliOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CliOutput {
    /// Stdout followed by stderr, as a terminal would show them.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        text.push_str(&self.stderr);
        text
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DockerCli {
    binary: String,
    timeout: Duration,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Default per-command deadline.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one command to completion.
    ///
    /// A non-zero exit is `CommandFailed` carrying stderr verbatim. A missing
    /// binary is `Unavailable`.
    pub async fn run(&self, args: &[String]) -> Result<CliOutput, BackendError> {
        self.run_with_timeout(args, self.timeout).await
    }

    /// [`Self::run`] with a deadline of `limit` instead of the default.
    pub async fn run_with_timeout(
        &self,
        args: &[String],
        limit: Duration,
    ) -> Result<CliOutput, BackendError> {
        let label = self.label(args);
        debug!(command = %label, "Running runtime command");

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(limit, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BackendError::Unavailable(format!(
                    "{} not found: {e}",
                    self.binary
                )));
            }
            Ok(Err(e)) => {
                return Err(BackendError::CommandFailed {
                    command: label,
                    message: e.to_string(),
                });
            }
            Err(_) => {
                return Err(BackendError::Timeout {
                    command: label,
                    seconds: limit.as_secs(),
                });
            }
        };

        let result = CliOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if output.status.success() {
            Ok(result)
        } else {
            let message = if result.stderr.trim().is_empty() {
                format!("exit status {}", output.status)
            } else {
                result.stderr.trim().to_string()
            };
            Err(BackendError::CommandFailed {
                command: label,
                message,
            })
        }
    }

    /// Run a streaming command until the timeout elapses, then kill it and
    /// return whatever was captured.
    pub async fn capture_until_timeout(&self, args: &[String]) -> Result<CliOutput, BackendError> {
        let label = self.label(args);
        debug!(command = %label, "Streaming runtime command");

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BackendError::Unavailable(format!("{}: {e}", self.binary)))?;

        let mut output = CliOutput::default();
        if let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) {
            let collect = async {
                tokio::join!(
                    read_lines(stdout, &mut output.stdout),
                    read_lines(stderr, &mut output.stderr)
                )
            };
            // Elapsing is the normal end of a follow.
            let _ = timeout(self.timeout, collect).await;
        }

        if let Err(e) = child.kill().await {
            debug!(command = %label, error = %e, "Streaming command already exited");
        }
        if let Err(e) = child.wait().await {
            debug!(command = %label, error = %e, "Failed to reap streaming command");
        }

        Ok(output)
    }

    fn label(&self, args: &[String]) -> String {
        match args.first() {
            Some(sub) => format!("{} {sub}", self.binary),
            None => self.binary.clone(),
        }
    }
}

async fn read_lines<R: AsyncRead + Unpin>(reader: R, sink: &mut String) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        sink.push_str(&line);
        sink.push('\n');
    }
}

/// Check whether a runtime error means the object does not exist.
pub(crate) fn is_no_such(err: &BackendError) -> bool {
    match err {
        BackendError::CommandFailed { message, .. } => {
            let lower = message.to_ascii_lowercase();
            lower.contains("no such") || lower.contains("not found")
        }
        BackendError::NotFound(_) => true,
        _ => false,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_run_success_captures_stdout() {
        let cli = DockerCli::new("sh", Duration::from_secs(5));
        let out = cli.run(&args(&["-c", "echo hello"])).await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_failure_carries_stderr() {
        let cli = DockerCli::new("sh", Duration::from_secs(5));
        let err = cli
            .run(&args(&["-c", "echo 'Error: No such container: x' >&2; exit 1"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No such container: x"));
        assert!(is_no_such(&err));
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let cli = DockerCli::new("sh", Duration::from_millis(200));
        let err = cli.run(&args(&["-c", "sleep 5"])).await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_run_with_timeout_overrides_default() {
        let cli = DockerCli::new("sh", Duration::from_millis(100));
        let out = cli
            .run_with_timeout(&args(&["-c", "sleep 0.3; echo done"]), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "done");
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let cli = DockerCli::new("/nonexistent/docker-binary", Duration::from_secs(1));
        let err = cli.run(&args(&["version"])).await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_capture_until_timeout_returns_partial_output() {
        let cli = DockerCli::new("sh", Duration::from_millis(300));
        let out = cli
            .capture_until_timeout(&args(&["-c", "echo first; sleep 5; echo never"]))
            .await
            .unwrap();
        assert_eq!(out.stdout, "first\n");
    }
}
