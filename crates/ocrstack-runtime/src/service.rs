//! A single supervised subprocess and its lifecycle state.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use ocrstack_core::spec::{ServiceRole, ServiceSpec};

use crate::pidfile::{self, PidFileData};
use crate::shutdown::shutdown_child;

/// Lifecycle state of a managed service.
///
/// Transitions are driven only by the supervisor or by the process's own
/// exit; `Stopped` and `Failed` are terminal for the launch they describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    NotStarted,
    Starting,
    Ready,
    Failed,
    Stopping,
    Stopped,
}

impl ServiceState {
    /// Stable lowercase name for log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

/// One externally-started subprocess owned by the supervisor.
///
/// Exactly one `ManagedService` exists per spec for the supervisor's
/// lifetime. The handle is the source of truth; the PID file it writes is
/// derived and best-effort.
pub struct ManagedService {
    spec: ServiceSpec,
    child: Child,
    pid: u32,
    state: ServiceState,
    exit: Option<ExitStatus>,
    pid_dir: Option<PathBuf>,
}

impl ManagedService {
    /// Launch the subprocess described by a spec.
    ///
    /// The spec's env overrides are applied on top of the inherited
    /// environment and stdout/stderr are forwarded line-by-line into the
    /// supervisor's log. A missing or unlaunchable executable fails here,
    /// immediately, as opposed to a readiness timeout later.
    pub fn start(spec: &ServiceSpec, pid_dir: Option<&Path>) -> Result<Self> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to launch {}: {}", spec.role, spec.command_line()))?;
        let pid = child.id().context("spawned child has no PID")?;

        info!(service = %spec.role, pid, command = %spec.command_line(), "service starting");
        spawn_log_forwarders(&mut child, spec.role);

        if let Some(dir) = pid_dir {
            let data = PidFileData {
                role: spec.role.as_str().to_string(),
                pid,
                port: spec.port,
                program: spec.program.clone(),
                started_at: unix_now(),
            };
            if let Err(e) = pidfile::write_pidfile(dir, &data) {
                debug!(service = %spec.role, error = %e, "failed to write PID file");
            }
        }

        Ok(Self {
            spec: spec.clone(),
            child,
            pid,
            state: ServiceState::Starting,
            exit: None,
            pid_dir: pid_dir.map(Path::to_path_buf),
        })
    }

    /// The spec this service was launched from.
    #[must_use]
    pub const fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    /// Role shorthand.
    #[must_use]
    pub const fn role(&self) -> ServiceRole {
        self.spec.role
    }

    /// OS process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ServiceState {
        self.state
    }

    /// Record that the readiness probe succeeded.
    pub fn mark_ready(&mut self) {
        if self.state == ServiceState::Starting {
            info!(service = %self.spec.role, pid = self.pid, "service is ready");
            self.state = ServiceState::Ready;
        }
    }

    /// Record that the process died without being asked to.
    pub fn mark_failed(&mut self) {
        self.state = ServiceState::Failed;
    }

    /// Non-blocking liveness check, caching the exit status once seen.
    pub fn is_alive(&mut self) -> bool {
        if self.exit.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit = Some(status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(service = %self.spec.role, error = %e, "failed to poll service liveness");
                false
            }
        }
    }

    /// Wait for the process to exit. Returns the cached status if it
    /// already has. Cancel-safe: dropping this future loses nothing.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        if let Some(status) = self.exit {
            return Ok(status);
        }
        let status = self.child.wait().await?;
        self.exit = Some(status);
        Ok(status)
    }

    /// Exit status, if the process has been observed to exit.
    #[must_use]
    pub const fn exit_status(&self) -> Option<ExitStatus> {
        self.exit
    }

    /// Terminate the process.
    ///
    /// Graceful termination sends SIGTERM and allows `grace` before
    /// force-killing; non-graceful goes straight to the kill. Idempotent:
    /// a service that is already `Stopped` is left alone, and termination
    /// errors are logged, never escalated.
    pub async fn terminate(&mut self, graceful: bool, grace: Duration) {
        if matches!(self.state, ServiceState::Stopped | ServiceState::NotStarted) {
            debug!(service = %self.spec.role, "terminate on a stopped service is a no-op");
            return;
        }
        self.state = ServiceState::Stopping;
        info!(service = %self.spec.role, pid = self.pid, graceful, "stopping service");

        // The process may have exited on its own since the last poll
        if self.exit.is_none() {
            if let Ok(Some(status)) = self.child.try_wait() {
                self.exit = Some(status);
            }
        }

        if self.exit.is_none() {
            let result = if graceful {
                shutdown_child(&mut self.child, grace).await
            } else {
                force_kill(&mut self.child).await
            };
            match result {
                Ok(status) => {
                    self.exit = Some(status);
                    debug!(service = %self.spec.role, code = ?status.code(), "service stopped");
                }
                Err(e) => {
                    warn!(service = %self.spec.role, error = %e, "error while stopping service");
                }
            }
        }

        self.state = ServiceState::Stopped;
        if let Some(dir) = &self.pid_dir {
            let _ = pidfile::delete_pidfile(dir, self.spec.role.as_str());
        }
    }
}

async fn force_kill(child: &mut Child) -> std::io::Result<ExitStatus> {
    child.kill().await?;
    child.wait().await
}

impl Drop for ManagedService {
    fn drop(&mut self) {
        // Last resort only; every supervisor path goes through terminate()
        if self.exit.is_none() && self.state != ServiceState::Stopped {
            let _ = self.child.start_kill();
        }
    }
}

fn spawn_log_forwarders(child: &mut Child, role: ServiceRole) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(service = %role, "{line}");
            }
            debug!(service = %role, "stdout forwarder exiting");
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(service = %role, "{line}");
            }
            debug!(service = %role, "stderr forwarder exiting");
        });
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
