//! JSON-RPC over a child process's stdin/stdout.

use std::process::Stdio;
use std::time::Duration;

use mcpp_core::LaunchCommand;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::decoder::{LineOutcome, decode_line};
use crate::error::ClientError;
use crate::process::ChildGuard;
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// One spawned server process and its streams.
#[derive(Debug)]
pub struct StdioTransport {
    guard: ChildGuard,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StdioTransport {
    /// Spawn `launch` with piped stdio in a process group of its own, so
    /// shutdown reaches anything the server forks.
    pub fn spawn(launch: &LaunchCommand, grace: Duration) -> Result<Self, ClientError> {
        let mut command = Command::new(&launch.program);
        command
            .args(&launch.args)
            .envs(&launch.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| {
            ClientError::Spawn(format!("'{}' {:?}: {e}", launch.program, launch.args))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClientError::Spawn("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientError::Spawn("Failed to get stdout".to_string()))?;

        // Drain stderr so a chatty server never blocks on a full pipe.
        if let Some(stderr) = child.stderr.take() {
            let program = launch.program.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(program = %program, "[stderr] {line}");
                }
            });
        }

        debug!(program = %launch.program, pid = ?child.id(), "Spawned server process");

        Ok(Self {
            guard: ChildGuard::new(child, grace),
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.guard.id()
    }

    /// Send `request` and read until the matching response.
    ///
    /// On timeout the process is terminated and reaped before returning.
    pub async fn request(
        &mut self,
        request: &JsonRpcRequest,
        limit: Duration,
    ) -> Result<JsonRpcResponse, ClientError> {
        let line = serde_json::to_string(request)? + "\n";
        let exchange = async {
            self.stdin.write_all(line.as_bytes()).await?;
            self.stdin.flush().await?;
            read_response(&mut self.stdout, request).await
        };

        match timeout(limit, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!(method = %request.method, "Server did not answer in time, terminating");
                if let Err(e) = self.guard.shutdown().await {
                    warn!(error = %e, "Failed to reap server process");
                }
                Err(ClientError::Timeout {
                    method: request.method.clone(),
                    millis: limit.as_millis(),
                })
            }
        }
    }

    /// Send a notification; nothing is read back.
    pub async fn notify(&mut self, notification: &JsonRpcNotification) -> Result<(), ClientError> {
        let line = serde_json::to_string(notification)? + "\n";
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Terminate and reap the process.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.guard.shutdown().await?;
        Ok(())
    }
}

// Lines are read as bytes: output that is not UTF-8 is noise like any other
// unparseable line.
async fn read_response(
    stdout: &mut BufReader<ChildStdout>,
    request: &JsonRpcRequest,
) -> Result<JsonRpcResponse, ClientError> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if stdout.read_until(b'\n', &mut buf).await? == 0 {
            return Err(ClientError::ProcessExited {
                method: request.method.clone(),
            });
        }
        let line = String::from_utf8_lossy(&buf);
        if let LineOutcome::Matched(response) = decode_line(&line, request.id) {
            return Ok(response);
        }
    }
}
