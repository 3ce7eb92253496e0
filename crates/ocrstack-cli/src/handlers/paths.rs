//! `paths` command handler.
//!
//! Displays the resolved runtime paths in `key = value` format, for
//! diagnosing path resolution issues.

use ocrstack_core::paths;

use crate::error::CliError;

pub fn execute() -> Result<(), CliError> {
    let runtime = paths::runtime_dir()?;
    let pids = paths::pid_dir()?;
    println!("runtime_dir = {}", runtime.display());
    println!("pid_dir = {}", pids.display());
    Ok(())
}
