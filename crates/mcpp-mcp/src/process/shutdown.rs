//! Graceful shutdown for `tokio::process::Child` with SIGTERM → SIGKILL escalation.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tracing::{debug, warn};

#[cfg(unix)]
use tokio::time::timeout;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::{Pid, getpgid};

/// Grace period between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Shut down a child process with SIGTERM, escalating to SIGKILL if needed.
///
/// # Strategy
/// 1. Send SIGTERM and wait up to `grace` for exit
/// 2. If still running, send SIGKILL
/// 3. Wait for reaping (required to avoid zombies)
///
/// A child that leads its own process group is signalled as a group, and
/// members still alive after the leader exits are sent SIGKILL.
///
/// On non-Unix targets the process is killed immediately.
pub async fn shutdown_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        shutdown_unix(child, grace).await
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        child.kill().await?;
        child.wait().await
    }
}

/// Where signals for a child go.
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
enum Target {
    Group(Pid),
    Process(Pid),
}

#[cfg(unix)]
impl Target {
    fn of(pid: u32) -> io::Result<Self> {
        let pid = i32::try_from(pid)
            .map(Pid::from_raw)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        Ok(match getpgid(Some(pid)) {
            Ok(pgid) if pgid == pid => Self::Group(pgid),
            _ => Self::Process(pid),
        })
    }

    fn signal(self, sig: Signal) -> nix::Result<()> {
        match self {
            Self::Group(pgid) => signal::killpg(pgid, sig),
            Self::Process(pid) => signal::kill(pid, sig),
        }
    }

    /// SIGKILL whatever is left of the group once the leader is gone.
    fn sweep(self) {
        let Self::Group(pgid) = self else {
            return;
        };
        match signal::killpg(pgid, Signal::SIGKILL) {
            Ok(()) => debug!(pgid = pgid.as_raw(), "Killed leftover process group members"),
            Err(Errno::ESRCH) => {}
            Err(e) => warn!(pgid = pgid.as_raw(), error = %e, "Failed to kill process group"),
        }
    }
}

#[cfg(unix)]
async fn shutdown_unix(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    // Already reaped or never started: nothing left to signal.
    let Some(pid) = child.id() else {
        return child.wait().await;
    };
    let target = Target::of(pid)?;

    if let Err(e) = target.signal(Signal::SIGTERM) {
        if e != Errno::ESRCH {
            return Err(io::Error::other(e));
        }
        let status = child.wait().await;
        target.sweep();
        return status;
    }

    if let Ok(result) = timeout(grace, child.wait()).await {
        debug!(pid, "Child exited after SIGTERM");
        target.sweep();
        return result;
    }

    warn!(pid, "Child ignored SIGTERM, sending SIGKILL");
    match target.signal(Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => return Err(io::Error::other(e)),
    }
    let status = child.wait().await;
    target.sweep();
    status
}

/// Owns a child process and guarantees it is killed and reaped.
///
/// [`ChildGuard::shutdown`] is the orderly path. If the guard is dropped
/// instead (an early return or a cancelled future), the child and its
/// process group are sent SIGKILL immediately and a background task reaps
/// the child.
#[derive(Debug)]
pub struct ChildGuard {
    child: Option<Child>,
    grace: Duration,
}

impl ChildGuard {
    pub const fn new(child: Child, grace: Duration) -> Self {
        Self {
            child: Some(child),
            grace,
        }
    }

    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Terminate and reap the child. Safe to call more than once.
    pub async fn shutdown(&mut self) -> io::Result<Option<ExitStatus>> {
        match self.child.take() {
            Some(mut child) => shutdown_child(&mut child, self.grace).await.map(Some),
            None => Ok(None),
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        #[cfg(unix)]
        if let Some(target) = child.id().and_then(|pid| Target::of(pid).ok()) {
            if let Err(e) = target.signal(Signal::SIGKILL) {
                debug!(error = %e, "Process group already gone on drop");
            }
        }
        if let Err(e) = child.start_kill() {
            debug!(error = %e, "Child already gone on drop");
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = child.wait().await {
                        debug!(error = %e, "Failed to reap child after drop");
                    }
                });
            }
            // No runtime left; tokio's orphan reaper collects it.
            Err(_) => drop(child),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Stdio;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::process::Command;
    use tokio::time::sleep;

    /// Spawn a group leader that forks a `sleep` and prints its pid.
    #[cfg(unix)]
    async fn spawn_forking_leader() -> (Child, u32) {
        let mut child = Command::new("sh")
            .args(["-c", "sleep 30 & echo $!; wait"])
            .stdout(Stdio::piped())
            .process_group(0)
            .spawn()
            .expect("failed to spawn sh");
        let stdout = child.stdout.take().unwrap();
        let line = BufReader::new(stdout).lines().next_line().await.unwrap().unwrap();
        (child, line.trim().parse().unwrap())
    }

    /// Zombies count as gone: the orphaned grandchild is reaped by init.
    #[cfg(unix)]
    fn running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(") ")
                .is_some_and(|(_, rest)| !rest.starts_with('Z')),
            Err(_) if std::path::Path::new("/proc/self").exists() => false,
            Err(_) => signal::kill(Pid::from_raw(i32::try_from(pid).unwrap()), None).is_ok(),
        }
    }

    #[cfg(unix)]
    async fn wait_until_gone(pid: u32) -> bool {
        for _ in 0..100 {
            if !running(pid) {
                return true;
            }
            sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn shutdown_responds_to_sigterm() {
        let mut child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("failed to spawn sleep");

        let status = shutdown_child(&mut child, DEFAULT_GRACE).await.unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn shutdown_escalates_to_sigkill() {
        let mut child = Command::new("sh")
            .args(["-c", "trap '' TERM; sleep 30"])
            .spawn()
            .expect("failed to spawn sh");
        // Give the shell time to install the trap.
        sleep(Duration::from_millis(200)).await;

        let status = shutdown_child(&mut child, Duration::from_millis(200))
            .await
            .unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn shutdown_handles_already_exited() {
        let mut child = Command::new("echo")
            .arg("test")
            .spawn()
            .expect("failed to spawn echo");

        sleep(Duration::from_millis(100)).await;

        assert!(shutdown_child(&mut child, DEFAULT_GRACE).await.is_ok());
    }

    #[tokio::test]
    async fn guard_shutdown_is_idempotent() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let mut guard = ChildGuard::new(child, DEFAULT_GRACE);
        assert!(guard.shutdown().await.unwrap().is_some());
        assert!(guard.shutdown().await.unwrap().is_none());
        assert!(guard.id().is_none());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn shutdown_reaches_the_process_group() {
        let (mut child, grandchild) = spawn_forking_leader().await;
        assert!(running(grandchild));

        shutdown_child(&mut child, Duration::from_millis(500))
            .await
            .unwrap();
        assert!(wait_until_gone(grandchild).await, "grandchild {grandchild} survived shutdown");
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn guard_drop_kills_the_process_group() {
        let (child, grandchild) = spawn_forking_leader().await;
        drop(ChildGuard::new(child, DEFAULT_GRACE));
        assert!(wait_until_gone(grandchild).await, "grandchild {grandchild} survived drop");
    }
}
