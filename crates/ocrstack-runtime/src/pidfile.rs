//! PID files for the supervised services.
//!
//! PID files are a derived, best-effort artifact: the supervisor's own
//! in-memory state is the source of truth. They exist so operators can
//! inspect a running stack, and so a later run can identify a stale
//! occupant of its port.
//!
//! # Safety guarantees
//! - Atomic writes via temp file + rename
//! - Occupant verification before killing (prevents PID reuse issues)
//! - Conservative cleanup: if verification fails, only the file is removed

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Contents of one PID file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidFileData {
    /// Service role name ("backend" or "frontend").
    pub role: String,
    /// Process ID.
    pub pid: u32,
    /// Port the service listens on.
    pub port: u16,
    /// Executable the service was launched from, for verification.
    pub program: String,
    /// Unix timestamp when the service was started.
    pub started_at: u64,
}

fn pidfile_path(dir: &Path, role: &str) -> PathBuf {
    dir.join(format!("{role}.json"))
}

/// Write a PID file atomically (temp file + rename).
pub fn write_pidfile(dir: &Path, data: &PidFileData) -> io::Result<()> {
    let path = pidfile_path(dir, &data.role);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

/// Read the PID file for a role, `None` if absent or unparseable.
pub fn read_pidfile(dir: &Path, role: &str) -> Option<PidFileData> {
    let raw = std::fs::read_to_string(pidfile_path(dir, role)).ok()?;
    serde_json::from_str(&raw).ok()
}

/// Remove the PID file for a role. Missing files are not an error.
pub fn delete_pidfile(dir: &Path, role: &str) -> io::Result<()> {
    match std::fs::remove_file(pidfile_path(dir, role)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// List all parseable PID files in a directory.
pub fn list_pidfiles(dir: &Path) -> io::Result<Vec<PidFileData>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            if let Ok(raw) = std::fs::read_to_string(&path) {
                if let Ok(data) = serde_json::from_str::<PidFileData>(&raw) {
                    entries.push(data);
                }
            }
        }
    }
    Ok(entries)
}

/// Check if a PID exists (without verifying what it runs).
///
/// Uses the null signal, which checks existence without delivering anything.
#[cfg(unix)]
pub fn pid_exists(pid: u32) -> bool {
    use nix::sys::signal;
    use nix::unistd::Pid;

    match signal::kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        // Process exists but we lack permission
        Err(_) => true,
    }
}

#[cfg(not(unix))]
pub fn pid_exists(_pid: u32) -> bool {
    false
}

/// Check whether a PID is still running the program a PID file recorded.
///
/// Returns `false` when verification is not possible; callers must treat
/// that as "do not kill" and only remove the stale file.
///
/// # Platform behavior
/// - **Linux**: reads the `/proc/<pid>/exe` symlink
/// - **Other Unix**: uses `sysinfo` to look up the executable path
/// - **Other**: always `false` (conservative)
pub fn occupant_matches(pid: u32, program: &str) -> bool {
    let Some(expected) = resolve_program(program) else {
        return false;
    };
    let Some(actual) = executable_of(pid) else {
        return false;
    };
    match (actual.canonicalize(), expected.canonicalize()) {
        (Ok(actual), Ok(expected)) => actual == expected,
        _ => false,
    }
}

/// Resolve a program name the way the shell would have at launch time.
fn resolve_program(program: &str) -> Option<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return path.canonicalize().ok();
    }
    which::which(program).ok()
}

#[cfg(target_os = "linux")]
fn executable_of(pid: u32) -> Option<PathBuf> {
    std::fs::read_link(format!("/proc/{pid}/exe")).ok()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn executable_of(pid: u32) -> Option<PathBuf> {
    use sysinfo::System;

    let sys = System::new_all();
    let process = sys.process(sysinfo::Pid::from_u32(pid))?;
    process.exe().map(Path::to_path_buf)
}

#[cfg(not(unix))]
fn executable_of(_pid: u32) -> Option<PathBuf> {
    None
}
