//! The supervisor state machine.
//!
//! One run drives the whole stack lifecycle: reclaim the backend port,
//! launch the backend, wait for it to become ready, launch the frontend,
//! then sit in `Running` until a service dies or shutdown is requested.
//! Teardown is always in reverse start order, frontend before backend,
//! and the state machine never leaves a service behind: every exit path
//! goes through the same shutdown step.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use ocrstack_core::outcome::{StartupFailureKind, SupervisorOutcome};
use ocrstack_core::settings::{BACKEND_PORT_ENV, SettingsError, StackSettings};
use ocrstack_core::spec::{ServiceRole, ServiceSpec};

use crate::ports::reclaim_port;
use crate::probe::{ProbeConfig, ReadinessResult, wait_until_ready};
use crate::service::ManagedService;

/// Phases of one supervisor run, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPhase {
    Idle,
    ReclaimingPort,
    StartingBackend,
    WaitingBackendReady,
    StartingFrontend,
    Running,
    ShuttingDown,
    Terminated,
}

impl SupervisorPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ReclaimingPort => "reclaiming-port",
            Self::StartingBackend => "starting-backend",
            Self::WaitingBackendReady => "waiting-backend-ready",
            Self::StartingFrontend => "starting-frontend",
            Self::Running => "running",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for SupervisorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a supervisor run needs, resolved up front.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Backend service to launch first.
    pub backend: ServiceSpec,
    /// Frontend service, launched only once the backend is ready.
    pub frontend: ServiceSpec,
    /// Readiness probe parameters for the backend.
    pub probe: ProbeConfig,
    /// SIGTERM-to-SIGKILL grace period at teardown.
    pub grace_period: Duration,
    /// Directory for PID files; `None` disables them.
    pub pid_dir: Option<PathBuf>,
}

impl SupervisorConfig {
    /// Resolve validated settings into a runnable configuration.
    pub fn from_settings(
        settings: &StackSettings,
        pid_dir: Option<PathBuf>,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let backend = settings.backend_spec()?;
        let frontend = settings.frontend_spec()?;
        let url = backend.readiness_url.clone().unwrap_or_else(|| {
            format!("http://localhost:{}{}", settings.backend_port, settings.ready_path)
        });
        Ok(Self {
            backend,
            frontend,
            probe: ProbeConfig {
                url,
                max_attempts: settings.ready_max_attempts,
                interval: Duration::from_secs(settings.ready_interval_secs),
                attempt_timeout: Duration::from_secs(settings.ready_timeout_secs),
            },
            grace_period: Duration::from_secs(settings.grace_period_secs),
            pid_dir,
        })
    }
}

/// What ended the `Running` phase.
enum RunEvent {
    ServiceExited { role: ServiceRole, exit_code: Option<i32> },
    ShutdownRequested,
}

/// Drives both services through one complete lifecycle.
pub struct Supervisor {
    config: SupervisorConfig,
    phase: SupervisorPhase,
}

impl Supervisor {
    #[must_use]
    pub const fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            phase: SupervisorPhase::Idle,
        }
    }

    /// Current phase, for observation in logs and tests.
    #[must_use]
    pub const fn phase(&self) -> SupervisorPhase {
        self.phase
    }

    fn set_phase(&mut self, next: SupervisorPhase) {
        debug!(from = %self.phase, to = %next, "supervisor phase change");
        self.phase = next;
    }

    /// Run the stack until it fails or `shutdown` is cancelled.
    ///
    /// Consumes the supervisor: a run is not restartable. A shutdown
    /// request at any point before `Running` still counts as a success,
    /// since nothing failed.
    pub async fn run(mut self, shutdown: CancellationToken) -> SupervisorOutcome {
        self.set_phase(SupervisorPhase::ReclaimingPort);
        for port in [self.config.backend.port, self.config.frontend.port] {
            reclaim_port(port, self.config.pid_dir.as_deref()).await;
        }

        if shutdown.is_cancelled() {
            return self.shut_down(None, None, SupervisorOutcome::Success).await;
        }

        self.set_phase(SupervisorPhase::StartingBackend);
        let mut backend =
            match ManagedService::start(&self.config.backend, self.config.pid_dir.as_deref()) {
                Ok(service) => service,
                Err(e) => {
                    error!(error = %e, "backend failed to launch");
                    return self
                        .shut_down(
                            None,
                            None,
                            SupervisorOutcome::StartupFailure(StartupFailureKind::BackendLaunch),
                        )
                        .await;
                }
            };

        self.set_phase(SupervisorPhase::WaitingBackendReady);
        let readiness = tokio::select! {
            result = wait_until_ready(&mut backend, &self.config.probe) => Some(result),
            () = shutdown.cancelled() => None,
        };
        match readiness {
            Some(ReadinessResult::Ready { attempts }) => {
                debug!(attempts, "backend readiness confirmed");
                backend.mark_ready();
            }
            Some(ReadinessResult::ProcessDied) => {
                backend.mark_failed();
                return self
                    .shut_down(
                        None,
                        Some(backend),
                        SupervisorOutcome::StartupFailure(StartupFailureKind::BackendCrashed),
                    )
                    .await;
            }
            Some(ReadinessResult::TimedOut) => {
                // Alive but unresponsive: skip SIGTERM and the grace window
                backend.terminate(false, Duration::ZERO).await;
                return self
                    .shut_down(
                        None,
                        Some(backend),
                        SupervisorOutcome::StartupFailure(StartupFailureKind::BackendTimeout),
                    )
                    .await;
            }
            None => {
                return self.shut_down(None, Some(backend), SupervisorOutcome::Success).await;
            }
        }

        self.set_phase(SupervisorPhase::StartingFrontend);
        // The frontend learns where the backend listens through its environment
        let frontend_spec = self
            .config
            .frontend
            .clone()
            .with_env(BACKEND_PORT_ENV, self.config.backend.port.to_string());
        let mut frontend =
            match ManagedService::start(&frontend_spec, self.config.pid_dir.as_deref()) {
                Ok(service) => service,
                Err(e) => {
                    error!(error = %e, "frontend failed to launch");
                    return self
                        .shut_down(
                            None,
                            Some(backend),
                            SupervisorOutcome::StartupFailure(StartupFailureKind::FrontendLaunch),
                        )
                        .await;
                }
            };
        // No probe for the frontend: launched means serving
        frontend.mark_ready();

        self.set_phase(SupervisorPhase::Running);
        info!(
            backend_port = self.config.backend.port,
            frontend_port = self.config.frontend.port,
            "stack is up"
        );

        let event = tokio::select! {
            status = backend.wait() => RunEvent::ServiceExited {
                role: ServiceRole::Backend,
                exit_code: status.ok().and_then(|s| s.code()),
            },
            status = frontend.wait() => RunEvent::ServiceExited {
                role: ServiceRole::Frontend,
                exit_code: status.ok().and_then(|s| s.code()),
            },
            () = shutdown.cancelled() => RunEvent::ShutdownRequested,
        };

        let outcome = match event {
            RunEvent::ServiceExited { role, exit_code } => {
                error!(service = %role, exit_code = ?exit_code, "service exited unexpectedly");
                match role {
                    ServiceRole::Backend => backend.mark_failed(),
                    ServiceRole::Frontend => frontend.mark_failed(),
                }
                SupervisorOutcome::RuntimeFailure {
                    service: role,
                    exit_code,
                }
            }
            RunEvent::ShutdownRequested => SupervisorOutcome::Success,
        };

        self.shut_down(Some(frontend), Some(backend), outcome).await
    }

    /// Tear down whatever is running, frontend first, and finish.
    async fn shut_down(
        mut self,
        frontend: Option<ManagedService>,
        backend: Option<ManagedService>,
        outcome: SupervisorOutcome,
    ) -> SupervisorOutcome {
        self.set_phase(SupervisorPhase::ShuttingDown);
        let grace = self.config.grace_period;
        if let Some(mut frontend) = frontend {
            frontend.terminate(true, grace).await;
        }
        if let Some(mut backend) = backend {
            backend.terminate(true, grace).await;
        }
        self.set_phase(SupervisorPhase::Terminated);
        info!(%outcome, "supervisor finished");
        outcome
    }
}
