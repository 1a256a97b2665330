//! Platform-specific configuration paths.
//!
//! - Linux: `~/.config/cadenza/`
//! - macOS: `~/Library/Application Support/cadenza/`
//! - Windows: `%APPDATA%\cadenza\`

use std::path::PathBuf;

use crate::error::ConfigError;

const APP_NAME: &str = "cadenza";

const CONFIG_FILE: &str = "config.toml";

/// Returns the user-specific configuration directory.
///
/// Falls back to the current directory if the platform config directory
/// cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the path of the default configuration file.
pub fn default_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE)
}

/// Creates the user configuration directory if needed and returns it.
pub fn ensure_user_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = user_config_dir();
    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::create_dir(&dir, e))?;
    Ok(dir)
}
