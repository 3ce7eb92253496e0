//! CLI-specific error types and exit-code mappings.

use thiserror::Error;

use ocrstack_core::paths::PathError;
use ocrstack_core::settings::SettingsError;

/// Errors that stop the CLI before or outside a supervisor run.
///
/// A completed run is not an error: its outcome carries its own exit
/// code, failed or not.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid or contradictory configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Path resolution failure.
    #[error("IO error: {0}")]
    Io(String),

    /// Signal handler installation failure.
    #[error("Process error: {0}")]
    Process(String),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// Exit codes follow Unix conventions (see sysexits.h):
    /// - 74: EX_IOERR
    /// - 71: EX_OSERR
    /// - 78: EX_CONFIG
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 78,
            Self::Io(_) => 74,
            Self::Process(_) => 71,
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        Self::Io(err.to_string())
    }
}
