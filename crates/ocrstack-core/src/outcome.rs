//! Terminal result of a supervisor run.
//!
//! The supervisor returns a single `SupervisorOutcome` value instead of
//! propagating a bare exit code; the CLI maps it to a process exit status.

use std::fmt;

use crate::spec::ServiceRole;

/// Why startup was aborted before the stack began serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupFailureKind {
    /// The backend executable could not be launched at all.
    BackendLaunch,
    /// The backend exited before ever answering a readiness probe.
    BackendCrashed,
    /// The backend stayed alive but never became ready in time.
    BackendTimeout,
    /// The frontend executable could not be launched.
    FrontendLaunch,
}

impl fmt::Display for StartupFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BackendLaunch => "backend-launch",
            Self::BackendCrashed => "backend-crashed",
            Self::BackendTimeout => "backend-timeout",
            Self::FrontendLaunch => "frontend-launch",
        };
        f.write_str(name)
    }
}

/// Terminal result of one supervisor invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorOutcome {
    /// Both services started and ran until an external stop request.
    Success,
    /// The stack never came up; nothing was left running.
    StartupFailure(StartupFailureKind),
    /// A service died after having been healthy; the peer was torn down.
    RuntimeFailure {
        /// Which service exited unexpectedly.
        service: ServiceRole,
        /// Its exit code, when the OS reported one.
        exit_code: Option<i32>,
    },
}

impl SupervisorOutcome {
    /// Map the outcome to a process exit code.
    ///
    /// Exit codes follow Unix conventions (see sysexits.h):
    /// - 0: clean run, stopped by external request
    /// - 69: EX_UNAVAILABLE (the stack never became available)
    /// - 70: EX_SOFTWARE (a previously healthy service died)
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::StartupFailure(_) => 69,
            Self::RuntimeFailure { .. } => 70,
        }
    }

    /// True when the run ended without any failure.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for SupervisorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::StartupFailure(kind) => write!(f, "startup failure ({kind})"),
            Self::RuntimeFailure { service, exit_code } => match exit_code {
                Some(code) => write!(f, "runtime failure ({service} exited with code {code})"),
                None => write!(f, "runtime failure ({service} killed by signal)"),
            },
        }
    }
}
