//! Filesystem locations used by the supervisor.

use std::path::PathBuf;

use thiserror::Error;

/// Errors resolving or creating runtime directories.
#[derive(Debug, Error)]
pub enum PathError {
    /// Could not determine the user's home directory.
    #[error("Cannot determine home directory")]
    NoHomeDir,

    /// Failed to create a directory.
    #[error("Failed to create directory {path}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },
}

/// Root runtime directory (`~/.ocrstack`), created on first use.
pub fn runtime_dir() -> Result<PathBuf, PathError> {
    let home = dirs::home_dir().ok_or(PathError::NoHomeDir)?;
    let dir = home.join(".ocrstack");
    ensure_dir(&dir)?;
    Ok(dir)
}

/// Directory holding per-service PID files (`~/.ocrstack/pids`).
///
/// PID files are a derived, best-effort artifact for external inspection
/// and stale-port cleanup; the in-memory supervisor state is the source
/// of truth.
pub fn pid_dir() -> Result<PathBuf, PathError> {
    let dir = runtime_dir()?.join("pids");
    ensure_dir(&dir)?;
    Ok(dir)
}

fn ensure_dir(dir: &PathBuf) -> Result<(), PathError> {
    std::fs::create_dir_all(dir).map_err(|e| PathError::CreateFailed {
        path: dir.clone(),
        reason: e.to_string(),
    })
}
