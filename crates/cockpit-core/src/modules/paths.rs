//! Data directory layout.

use std::fs;
use std::path::{Path, PathBuf};

/// Directory name for data storage under the home directory.
pub const DATA_DIR: &str = ".antigravity_cockpit";
/// Environment override for the data directory.
pub const DATA_DIR_ENV: &str = "COCKPIT_DATA_DIR";
/// Key/value state file (history, watermarks, schedule).
pub const STATE_FILE: &str = "cockpit_state.json";
/// Model catalog cache, relative to the data directory.
pub const CATALOG_CACHE_FILE: &str = "cache/model_catalog.json";
/// Daily-rotated log files.
pub const LOGS_DIR: &str = "logs";

/// Get the data directory path.
///
/// Priority:
/// 1. `COCKPIT_DATA_DIR` environment variable (for container deployments)
/// 2. `~/.antigravity_cockpit`
pub fn get_data_dir() -> Result<PathBuf, String> {
    let data_dir = if let Ok(custom_dir) = std::env::var(DATA_DIR_ENV) {
        PathBuf::from(custom_dir)
    } else {
        let home = dirs::home_dir().ok_or("Cannot get home directory")?;
        home.join(DATA_DIR)
    };

    ensure_dir(&data_dir)?;
    Ok(data_dir)
}

/// Create a directory (and parents) if missing.
pub fn ensure_dir(dir: &Path) -> Result<(), String> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .map_err(|e| format!("Failed to create directory {}: {}", dir.display(), e))?;
    }
    Ok(())
}

/// Write `content` next to `path` and rename it into place.
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    if let Err(e) = fs::write(&temp_path, content) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        e
    })
}
