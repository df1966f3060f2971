//! Platform-specific path utilities.

use std::path::PathBuf;

/// Directory that holds session sockets and lock files.
///
/// # Platform Behavior
/// - **Linux**: `$XDG_RUNTIME_DIR` (usually `/run/user/<uid>`)
/// - **Windows / macOS**: the system temp directory
pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir().unwrap_or_else(std::env::temp_dir)
}

/// Name of the user running this process, used to keep sessions of
/// different users apart.
pub fn current_user() -> String {
    ["USER", "USERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "default".to_string())
}
