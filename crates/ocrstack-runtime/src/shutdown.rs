//! Graceful process termination with SIGTERM → SIGKILL escalation.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(unix)]
use tokio::time::{sleep, timeout};

/// Gracefully shut down a child process we own the handle for.
///
/// # Strategy
/// 1. Send SIGTERM and wait up to `grace` for a clean exit
/// 2. If still running, send SIGKILL
/// 3. Wait for reaping (required to avoid zombies)
///
/// # Platform behavior
/// - Unix: SIGTERM via nix, then SIGKILL via `Child::kill`
/// - Windows: immediate `Child::kill` (no graceful shutdown available)
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

#[cfg(unix)]
async fn shutdown_unix(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    let Some(pid) = child.id() else {
        // Already reaped by a previous wait
        return child.wait().await;
    };

    if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        // Process may have already exited
        if e == Errno::ESRCH {
            return child.wait().await;
        }
        return Err(io::Error::other(e));
    }

    if let Ok(result) = timeout(grace, child.wait()).await {
        return result;
    }

    // Grace period elapsed - escalate to SIGKILL and reap
    child.kill().await?;
    child.wait().await
}

/// Kill a process by PID when no `Child` handle is available.
///
/// Used for stale occupants from previous runs; the process cannot be
/// reaped here, so exit is verified by polling the null signal.
///
/// Returns `Ok(())` if the process was killed or already gone.
pub async fn kill_pid(pid: u32, grace: Duration) -> io::Result<()> {
    #[cfg(unix)]
    {
        kill_pid_unix(pid, grace).await
    }

    #[cfg(not(unix))]
    {
        let _ = (pid, grace);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stale process cleanup not implemented on this platform",
        ))
    }
}

#[cfg(unix)]
async fn kill_pid_unix(pid: u32, grace: Duration) -> io::Result<()> {
    let nix_pid = Pid::from_raw(pid as i32);

    if let Err(e) = signal::kill(nix_pid, Signal::SIGTERM) {
        if e == Errno::ESRCH {
            return Ok(());
        }
        return Err(io::Error::other(e));
    }

    if poll_until_gone(nix_pid, grace).await {
        return Ok(());
    }

    if let Err(e) = signal::kill(nix_pid, Signal::SIGKILL) {
        if e == Errno::ESRCH {
            return Ok(());
        }
        return Err(io::Error::other(e));
    }

    if poll_until_gone(nix_pid, Duration::from_secs(2)).await {
        return Ok(());
    }

    Err(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("process {pid} did not exit after SIGKILL"),
    ))
}

/// Poll the null signal until the process disappears or the window closes.
///
/// A zombie counts as gone: it no longer holds the port, and only its
/// parent can reap it.
#[cfg(unix)]
async fn poll_until_gone(pid: Pid, window: Duration) -> bool {
    let step = Duration::from_millis(100);
    let steps = (window.as_millis() / step.as_millis()).max(1);
    for _ in 0..steps {
        sleep(step).await;
        match signal::kill(pid, None) {
            Ok(()) if is_zombie(pid) => return true,
            Ok(()) => {}
            Err(Errno::ESRCH) => return true,
            // Permission error - assume still alive
            Err(_) => {}
        }
    }
    false
}

#[cfg(all(unix, target_os = "linux"))]
fn is_zombie(pid: Pid) -> bool {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid.as_raw())).unwrap_or_default();
    // The state field follows the parenthesised command name
    stat.rsplit_once(')')
        .map(|(_, rest)| rest.trim_start().starts_with('Z'))
        .unwrap_or(false)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: Pid) -> bool {
    false
}
