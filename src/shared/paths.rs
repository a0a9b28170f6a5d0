use std::path::{Path, PathBuf};

pub const APP_DIR_NAME: &str = "regionreel";

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Get the base storage directory following XDG Base Directory Specification.
/// Returns `$XDG_DATA_HOME/regionreel` or `~/.local/share/regionreel`.
pub fn get_storage_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        if !xdg_data.is_empty() {
            return PathBuf::from(xdg_data).join(APP_DIR_NAME);
        }
    }

    home_dir().join(".local").join("share").join(APP_DIR_NAME)
}

/// Returns `{storage_dir}/logs`.
pub fn get_log_dir() -> PathBuf {
    get_storage_dir().join("logs")
}

/// Returns `{storage_dir}/settings.json`.
pub fn get_settings_path() -> PathBuf {
    get_storage_dir().join("settings.json")
}

/// Default place for finished recordings: the user's videos directory
/// (`$XDG_VIDEOS_DIR`), or `~/Videos`, plus an app subfolder.
pub fn get_default_output_dir() -> PathBuf {
    dirs::video_dir()
        .unwrap_or_else(|| home_dir().join("Videos"))
        .join(APP_DIR_NAME)
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
