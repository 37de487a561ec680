//! Data directory layout.

use std::path::PathBuf;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "FORMFLOW_DATA_DIR";

/// Resolve the data directory.
///
/// Priority:
/// 1. `FORMFLOW_DATA_DIR` environment variable
/// 2. `~/.formflow`
/// 3. `.formflow` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".formflow");
    }

    PathBuf::from(".formflow")
}

/// Create the data directory if it does not exist yet.
pub async fn ensure_data_dir(dir: &std::path::Path) -> Result<(), std::io::Error> {
    tokio::fs::create_dir_all(dir).await
}
