//! Port availability checks and stale-occupant reclamation.

use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::pidfile;
use crate::shutdown::kill_pid;

/// Check if a port is available by attempting to bind to it.
/// The listener is dropped immediately, which releases the port.
pub fn is_port_available(port: u16) -> bool {
    match TcpListener::bind(("127.0.0.1", port)) {
        Ok(listener) => listener.local_addr().is_ok(),
        Err(_) => false,
    }
}

/// Result of one reclamation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortReclaim {
    /// Nothing was listening; the port can be bound as-is.
    AlreadyFree,
    /// One or more stale occupants were terminated.
    Reclaimed { killed: Vec<u32> },
    /// The port is busy but no occupant could be identified or killed.
    /// The service's own bind attempt will surface the real error.
    StillOccupied,
}

/// Free a port from a stale occupant of a previous run, best-effort.
///
/// Single attempt, no retries. Occupants are identified two ways:
/// a PID file from a previous run whose recorded port matches (verified
/// against the recorded program before killing), and `lsof` when it is
/// installed. Failures are logged and never escalate; if the port stays
/// busy the new service's bind error is the authoritative one.
pub async fn reclaim_port(port: u16, pid_dir: Option<&Path>) -> PortReclaim {
    if is_port_available(port) {
        debug!(port, "port already free, nothing to reclaim");
        return PortReclaim::AlreadyFree;
    }

    let self_pid = std::process::id();
    // (pid, role of the PID file it came from, if any)
    let mut candidates: Vec<(u32, Option<String>)> = Vec::new();

    if let Some(dir) = pid_dir {
        for data in pidfile::list_pidfiles(dir).unwrap_or_default() {
            if data.port != port || data.pid == self_pid {
                continue;
            }
            if !pidfile::pid_exists(data.pid) {
                debug!(pid = data.pid, role = %data.role, "stale PID file for dead process, removing");
                let _ = pidfile::delete_pidfile(dir, &data.role);
                continue;
            }
            if pidfile::occupant_matches(data.pid, &data.program) {
                candidates.push((data.pid, Some(data.role)));
            } else {
                // PID was reused by something else - never kill it
                debug!(
                    pid = data.pid,
                    program = %data.program,
                    "PID file occupant no longer matches recorded program, removing stale file"
                );
                let _ = pidfile::delete_pidfile(dir, &data.role);
            }
        }
    }

    for pid in lsof_listener_pids(port).await {
        if pid != self_pid && !candidates.iter().any(|(p, _)| *p == pid) {
            candidates.push((pid, None));
        }
    }

    if candidates.is_empty() {
        warn!(port, "port is busy but no occupant could be identified");
        return PortReclaim::StillOccupied;
    }

    let mut killed = Vec::new();
    for (pid, role) in candidates {
        info!(port, pid, "terminating stale occupant");
        match kill_pid(pid, Duration::from_secs(2)).await {
            Ok(()) => {
                killed.push(pid);
                if let (Some(dir), Some(role)) = (pid_dir, role) {
                    let _ = pidfile::delete_pidfile(dir, &role);
                }
            }
            Err(e) => {
                warn!(port, pid, error = %e, "failed to terminate stale occupant");
            }
        }
    }

    if killed.is_empty() {
        PortReclaim::StillOccupied
    } else {
        PortReclaim::Reclaimed { killed }
    }
}

/// PIDs listening on a TCP port according to `lsof`, when installed.
async fn lsof_listener_pids(port: u16) -> Vec<u32> {
    let Ok(lsof) = which::which("lsof") else {
        debug!("lsof not installed, skipping listener lookup");
        return Vec::new();
    };

    let output = Command::new(lsof)
        .args(["-t", &format!("-iTCP:{port}"), "-sTCP:LISTEN"])
        .output()
        .await;

    match output {
        Ok(out) => String::from_utf8_lossy(&out.stdout)
            .lines()
            .filter_map(|line| line.trim().parse().ok())
            .collect(),
        Err(e) => {
            debug!(error = %e, "lsof invocation failed");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pidfile::{PidFileData, read_pidfile, write_pidfile};

    #[test]
    fn free_port_is_available() {
        // Bind to an ephemeral port to learn a free one, then release it
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        assert!(is_port_available(port));
    }

    #[test]
    fn bound_port_is_not_available() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        assert!(!is_port_available(port));
    }

    #[tokio::test]
    async fn reclaiming_a_free_port_is_a_noop() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        assert_eq!(reclaim_port(port, None).await, PortReclaim::AlreadyFree);
    }

    #[tokio::test]
    async fn busy_port_without_identifiable_occupant_stays_occupied() {
        // The test process itself holds the port; its own PID is filtered
        // out of the candidate list, so nothing can be killed.
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let dir = tempfile::tempdir().expect("tempdir");

        let result = reclaim_port(port, Some(dir.path())).await;
        assert_eq!(result, PortReclaim::StillOccupied);
    }

    #[tokio::test]
    #[cfg(target_os = "linux")]
    async fn verified_pidfile_occupant_is_killed() {
        // A long-lived child stands in for the stale occupant; the busy
        // port condition is provided by a listener the test owns.
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();

        let mut child = Command::new("sleep").arg("60").spawn().expect("spawn sleep");
        let pid = child.id().expect("pid");

        let dir = tempfile::tempdir().expect("tempdir");
        write_pidfile(
            dir.path(),
            &PidFileData {
                role: "backend".to_string(),
                pid,
                port,
                program: "sleep".to_string(),
                started_at: 0,
            },
        )
        .expect("write pidfile");

        let result = reclaim_port(port, Some(dir.path())).await;
        assert_eq!(result, PortReclaim::Reclaimed { killed: vec![pid] });
        assert!(read_pidfile(dir.path(), "backend").is_none());

        // Reap the killed child
        let _ = child.wait().await;
    }

    #[tokio::test]
    async fn mismatched_pidfile_is_removed_without_killing() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();

        // Record the test's own PID under a program it is not running
        let dir = tempfile::tempdir().expect("tempdir");
        let mut child = Command::new("sleep").arg("60").spawn().expect("spawn sleep");
        let pid = child.id().expect("pid");
        write_pidfile(
            dir.path(),
            &PidFileData {
                role: "backend".to_string(),
                pid,
                port,
                program: "no-such-binary-xyz".to_string(),
                started_at: 0,
            },
        )
        .expect("write pidfile");

        let result = reclaim_port(port, Some(dir.path())).await;
        assert_eq!(result, PortReclaim::StillOccupied);
        // Stale file removed, process untouched
        assert!(read_pidfile(dir.path(), "backend").is_none());
        assert!(crate::pidfile::pid_exists(pid));

        child.kill().await.expect("kill");
        let _ = child.wait().await;
    }
}
