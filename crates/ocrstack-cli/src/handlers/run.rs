//! `run` command handler.

use tracing::warn;

use ocrstack_core::paths;
use ocrstack_runtime::{Supervisor, SupervisorConfig, spawn_signal_listener};

use crate::commands::RunArgs;
use crate::error::CliError;

/// Launch the stack and supervise it until it stops.
///
/// Returns the process exit code of the completed run; a run that ends
/// in a failure outcome is still an `Ok` here, since the supervisor
/// already tore everything down and reported it.
pub async fn execute(args: &RunArgs) -> Result<i32, CliError> {
    let settings = args.to_settings();

    // PID files are best-effort; an unresolvable home directory disables them
    let pid_dir = match paths::pid_dir() {
        Ok(dir) => Some(dir),
        Err(e) => {
            warn!(error = %e, "PID files disabled");
            None
        }
    };

    let config = SupervisorConfig::from_settings(&settings, pid_dir)?;
    let shutdown = spawn_signal_listener().map_err(|e| CliError::Process(e.to_string()))?;

    let outcome = Supervisor::new(config).run(shutdown).await;
    if !outcome.is_success() {
        eprintln!("ocrstack: {outcome}");
    }
    Ok(outcome.exit_code())
}
