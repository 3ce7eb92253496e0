//! Supervisor settings and validation.
//!
//! Settings are read once at startup (CLI flags with env fallbacks) and
//! turned into the two immutable `ServiceSpec`s. Defaults mirror the
//! serving stack this supervisor was built for: an sglang inference
//! server and a uvicorn API service in front of it.

use thiserror::Error;

use crate::spec::{ServiceRole, ServiceSpec};

/// Default port the inference backend listens on.
pub const DEFAULT_BACKEND_PORT: u16 = 30024;

/// Default port the API frontend listens on.
pub const DEFAULT_FRONTEND_PORT: u16 = 8000;

/// Default readiness endpoint path on the backend.
pub const DEFAULT_READY_PATH: &str = "/v1/models";

/// Default number of readiness probe attempts.
pub const DEFAULT_READY_MAX_ATTEMPTS: u32 = 300;

/// Default pause between readiness probe attempts, in seconds.
pub const DEFAULT_READY_INTERVAL_SECS: u64 = 1;

/// Default per-attempt HTTP timeout for the readiness probe, in seconds.
pub const DEFAULT_READY_TIMEOUT_SECS: u64 = 2;

/// Default grace period between SIGTERM and SIGKILL, in seconds.
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 5;

/// Default uvicorn worker count for the frontend.
pub const DEFAULT_FRONTEND_WORKERS: u32 = 1;

/// Default keep-alive timeout for the frontend, in seconds.
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 5;

/// Default model served by the backend.
pub const DEFAULT_MODEL: &str = "allenai/olmOCR-7B-0225-preview";

/// Default chat template passed to the backend.
pub const DEFAULT_CHAT_TEMPLATE: &str = "qwen2-vl";

/// Environment variable carrying the backend port to the frontend.
pub const BACKEND_PORT_ENV: &str = "SGLANG_SERVER_PORT";

/// Everything the supervisor reads from configuration, resolved.
#[derive(Debug, Clone)]
pub struct StackSettings {
    /// Full backend command; `None` uses the built-in sglang launch command.
    /// A custom command must listen on `backend_port`.
    pub backend_cmd: Option<String>,
    /// Port the backend listens on (also the port reclaimed at startup).
    pub backend_port: u16,
    /// Path of the backend readiness endpoint.
    pub ready_path: String,
    /// Maximum readiness probe attempts before giving up.
    pub ready_max_attempts: u32,
    /// Pause between probe attempts, in seconds.
    pub ready_interval_secs: u64,
    /// Per-attempt HTTP timeout, in seconds.
    pub ready_timeout_secs: u64,
    /// Model passed to the built-in backend command.
    pub model: String,
    /// Chat template passed to the built-in backend command.
    pub chat_template: String,
    /// Full frontend command; `None` uses the built-in uvicorn command.
    /// A custom command must listen on `frontend_port`.
    pub frontend_cmd: Option<String>,
    /// Port the frontend listens on.
    pub frontend_port: u16,
    /// Worker count for the built-in frontend command.
    pub frontend_workers: u32,
    /// Keep-alive timeout for the built-in frontend command, in seconds.
    pub keep_alive_secs: u64,
    /// Grace period between SIGTERM and SIGKILL at shutdown, in seconds.
    pub grace_period_secs: u64,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            backend_cmd: None,
            backend_port: DEFAULT_BACKEND_PORT,
            ready_path: DEFAULT_READY_PATH.to_string(),
            ready_max_attempts: DEFAULT_READY_MAX_ATTEMPTS,
            ready_interval_secs: DEFAULT_READY_INTERVAL_SECS,
            ready_timeout_secs: DEFAULT_READY_TIMEOUT_SECS,
            model: DEFAULT_MODEL.to_string(),
            chat_template: DEFAULT_CHAT_TEMPLATE.to_string(),
            frontend_cmd: None,
            frontend_port: DEFAULT_FRONTEND_PORT,
            frontend_workers: DEFAULT_FRONTEND_WORKERS,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            grace_period_secs: DEFAULT_GRACE_PERIOD_SECS,
        }
    }
}

/// Settings validation errors.
#[derive(Debug, Clone, Error)]
pub enum SettingsError {
    #[error("Port should be >= 1024 (privileged ports require root), got {0}")]
    InvalidPort(u16),

    #[error("Backend and frontend cannot share port {0}")]
    PortConflict(u16),

    #[error("Readiness probe needs at least one attempt")]
    NoProbeAttempts,

    #[error("Readiness path must start with '/', got {0:?}")]
    InvalidReadyPath(String),

    #[error("Empty command for {0} service")]
    EmptyCommand(ServiceRole),
}

impl StackSettings {
    /// Validate settings values.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for port in [self.backend_port, self.frontend_port] {
            if port < 1024 {
                return Err(SettingsError::InvalidPort(port));
            }
        }
        if self.backend_port == self.frontend_port {
            return Err(SettingsError::PortConflict(self.backend_port));
        }
        if self.ready_max_attempts == 0 {
            return Err(SettingsError::NoProbeAttempts);
        }
        if !self.ready_path.starts_with('/') {
            return Err(SettingsError::InvalidReadyPath(self.ready_path.clone()));
        }
        Ok(())
    }

    /// Build the backend service spec.
    pub fn backend_spec(&self) -> Result<ServiceSpec, SettingsError> {
        let (program, args) = match &self.backend_cmd {
            Some(cmd) => split_command(cmd, ServiceRole::Backend)?,
            None => (
                "python3".to_string(),
                vec![
                    "-m".into(),
                    "sglang.launch_server".into(),
                    "--model-path".into(),
                    self.model.clone(),
                    "--chat-template".into(),
                    self.chat_template.clone(),
                    "--port".into(),
                    self.backend_port.to_string(),
                    "--log-level-http".into(),
                    "warning".into(),
                ],
            ),
        };
        let url = format!("http://localhost:{}{}", self.backend_port, self.ready_path);
        Ok(ServiceSpec::new(ServiceRole::Backend, program, args, self.backend_port)
            .with_readiness_url(url))
    }

    /// Build the frontend service spec.
    ///
    /// The backend address is injected by the supervisor at launch time,
    /// not here, so the spec stays valid even if ports are renegotiated.
    pub fn frontend_spec(&self) -> Result<ServiceSpec, SettingsError> {
        let (program, args) = match &self.frontend_cmd {
            Some(cmd) => split_command(cmd, ServiceRole::Frontend)?,
            None => (
                "uvicorn".to_string(),
                vec![
                    "http_service:app".into(),
                    "--host".into(),
                    "0.0.0.0".into(),
                    "--port".into(),
                    self.frontend_port.to_string(),
                    "--workers".into(),
                    self.frontend_workers.to_string(),
                    "--timeout-keep-alive".into(),
                    self.keep_alive_secs.to_string(),
                ],
            ),
        };
        Ok(ServiceSpec::new(ServiceRole::Frontend, program, args, self.frontend_port))
    }
}

fn split_command(cmd: &str, role: ServiceRole) -> Result<(String, Vec<String>), SettingsError> {
    let mut parts = cmd.split_whitespace().map(str::to_string);
    let program = parts.next().ok_or(SettingsError::EmptyCommand(role))?;
    Ok((program, parts.collect()))
}
