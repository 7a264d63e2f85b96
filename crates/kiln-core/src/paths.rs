//! Filesystem locations under the kiln home directory.

use dirs::home_dir;
use std::path::PathBuf;

/// Returns the kiln home directory, or None if the user's home cannot be resolved.
pub fn try_kiln_home() -> Option<PathBuf> {
    if let Some(val) = std::env::var_os("KILN_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".kiln"))
}

/// Returns the kiln home directory (`~/.kiln`, or `KILN_HOME`).
///
/// Falls back to `<system temp>/kiln` when no home directory is known, so
/// builds still work in bare containers.
pub fn kiln_home() -> PathBuf {
    try_kiln_home().unwrap_or_else(|| std::env::temp_dir().join("kiln"))
}

/// Logs directory: ~/.kiln/logs
pub fn log_dir() -> PathBuf {
    kiln_home().join("logs")
}

/// Generate a build log path for a recipe
pub fn build_log_path(name: &str, version: &str) -> PathBuf {
    let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    log_dir().join(format!("build-{name}-{version}-{timestamp}.log"))
}

/// Temp path for build workspaces: ~/.kiln/tmp
pub fn tmp_path() -> PathBuf {
    kiln_home().join("tmp")
}
