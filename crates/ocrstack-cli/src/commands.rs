//! Subcommand definitions.

use clap::{Args, Subcommand};

use ocrstack_core::settings::{
    DEFAULT_BACKEND_PORT, DEFAULT_CHAT_TEMPLATE, DEFAULT_FRONTEND_PORT, DEFAULT_FRONTEND_WORKERS,
    DEFAULT_GRACE_PERIOD_SECS, DEFAULT_KEEP_ALIVE_SECS, DEFAULT_MODEL, DEFAULT_READY_INTERVAL_SECS,
    DEFAULT_READY_MAX_ATTEMPTS, DEFAULT_READY_PATH, DEFAULT_READY_TIMEOUT_SECS, StackSettings,
};

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the serving stack and supervise it until it stops
    Run(RunArgs),

    /// Print the resolved runtime paths
    Paths,
}

/// Arguments for `ocrstack run`.
///
/// Every flag has an `OCRSTACK_*` environment fallback, so a deployment
/// can configure the stack entirely from its environment.
#[derive(Args)]
pub struct RunArgs {
    /// Full backend command, replacing the built-in sglang launch
    #[arg(long, env = "OCRSTACK_BACKEND_CMD")]
    pub backend_cmd: Option<String>,

    /// Port the inference backend listens on
    #[arg(long, env = "OCRSTACK_BACKEND_PORT", default_value_t = DEFAULT_BACKEND_PORT)]
    pub backend_port: u16,

    /// Path of the backend readiness endpoint
    #[arg(long, env = "OCRSTACK_READY_PATH", default_value = DEFAULT_READY_PATH)]
    pub ready_path: String,

    /// Maximum readiness probe attempts before giving up
    #[arg(long, env = "OCRSTACK_READY_MAX_ATTEMPTS", default_value_t = DEFAULT_READY_MAX_ATTEMPTS)]
    pub ready_max_attempts: u32,

    /// Seconds between readiness probe attempts
    #[arg(long, env = "OCRSTACK_READY_INTERVAL", default_value_t = DEFAULT_READY_INTERVAL_SECS)]
    pub ready_interval_secs: u64,

    /// Per-attempt HTTP timeout for the readiness probe, in seconds
    #[arg(long, env = "OCRSTACK_READY_TIMEOUT", default_value_t = DEFAULT_READY_TIMEOUT_SECS)]
    pub ready_timeout_secs: u64,

    /// Model served by the built-in backend command
    #[arg(long, env = "OCRSTACK_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Chat template passed to the built-in backend command
    #[arg(long, env = "OCRSTACK_CHAT_TEMPLATE", default_value = DEFAULT_CHAT_TEMPLATE)]
    pub chat_template: String,

    /// Full frontend command, replacing the built-in uvicorn launch
    #[arg(long, env = "OCRSTACK_FRONTEND_CMD")]
    pub frontend_cmd: Option<String>,

    /// Port the API frontend listens on
    #[arg(long, env = "OCRSTACK_FRONTEND_PORT", default_value_t = DEFAULT_FRONTEND_PORT)]
    pub frontend_port: u16,

    /// Worker count for the built-in frontend command
    #[arg(long, env = "OCRSTACK_FRONTEND_WORKERS", default_value_t = DEFAULT_FRONTEND_WORKERS)]
    pub frontend_workers: u32,

    /// Keep-alive timeout for the built-in frontend command, in seconds
    #[arg(long, env = "OCRSTACK_KEEP_ALIVE", default_value_t = DEFAULT_KEEP_ALIVE_SECS)]
    pub keep_alive_secs: u64,

    /// Grace period between SIGTERM and SIGKILL at shutdown, in seconds
    #[arg(long, env = "OCRSTACK_GRACE_PERIOD", default_value_t = DEFAULT_GRACE_PERIOD_SECS)]
    pub grace_period_secs: u64,
}

impl RunArgs {
    /// Resolve the parsed arguments into supervisor settings.
    #[must_use]
    pub fn to_settings(&self) -> StackSettings {
        StackSettings {
            backend_cmd: self.backend_cmd.clone(),
            backend_port: self.backend_port,
            ready_path: self.ready_path.clone(),
            ready_max_attempts: self.ready_max_attempts,
            ready_interval_secs: self.ready_interval_secs,
            ready_timeout_secs: self.ready_timeout_secs,
            model: self.model.clone(),
            chat_template: self.chat_template.clone(),
            frontend_cmd: self.frontend_cmd.clone(),
            frontend_port: self.frontend_port,
            frontend_workers: self.frontend_workers,
            keep_alive_secs: self.keep_alive_secs,
            grace_period_secs: self.grace_period_secs,
        }
    }
}
