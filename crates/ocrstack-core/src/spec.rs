//! Immutable descriptions of the two supervised services.

use std::fmt;

/// Which half of the stack a service is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    /// The inference server (model backend).
    Backend,
    /// The API service that forwards requests to the backend.
    Frontend,
}

impl ServiceRole {
    /// Stable lowercase name, used in logs and PID file names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backend => "backend",
            Self::Frontend => "frontend",
        }
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of a launchable service.
///
/// Built once from settings at startup and never mutated afterwards. The
/// supervisor clones it into the managed process it launches.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    /// Role of this service within the stack.
    pub role: ServiceRole,
    /// Executable to launch.
    pub program: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Environment overrides applied on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// TCP port the service is expected to listen on.
    pub port: u16,
    /// Readiness endpoint polled before the service counts as up.
    /// The frontend has none; its own callers health-check it.
    pub readiness_url: Option<String>,
}

impl ServiceSpec {
    /// Create a spec with no env overrides and no readiness URL.
    #[must_use]
    pub fn new(role: ServiceRole, program: impl Into<String>, args: Vec<String>, port: u16) -> Self {
        Self {
            role,
            program: program.into(),
            args,
            env: Vec::new(),
            port,
            readiness_url: None,
        }
    }

    /// Set the readiness URL polled by the probe.
    #[must_use]
    pub fn with_readiness_url(mut self, url: impl Into<String>) -> Self {
        self.readiness_url = Some(url.into());
        self
    }

    /// Add an environment override.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Full command line for log output.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_are_stable() {
        assert_eq!(ServiceRole::Backend.as_str(), "backend");
        assert_eq!(ServiceRole::Frontend.as_str(), "frontend");
    }

    #[test]
    fn command_line_joins_program_and_args() {
        let spec = ServiceSpec::new(
            ServiceRole::Backend,
            "python3",
            vec!["-m".into(), "sglang.launch_server".into()],
            30024,
        );
        assert_eq!(spec.command_line(), "python3 -m sglang.launch_server");
    }

    #[test]
    fn builders_accumulate() {
        let spec = ServiceSpec::new(ServiceRole::Frontend, "uvicorn", vec![], 8000)
            .with_env("SGLANG_SERVER_PORT", "30024")
            .with_readiness_url("http://localhost:8000/health");
        assert_eq!(spec.env.len(), 1);
        assert!(spec.readiness_url.is_some());
    }
}
