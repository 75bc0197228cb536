//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use windsock_core::StationConfig;

/// Get the config file path.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("windsock")
        .join("config.toml")
}

/// Load config from the default location, or return defaults if not found.
pub fn load() -> StationConfig {
    load_from(&config_path())
}

/// Load config from a specific path, or return defaults if not found.
pub fn load_from(path: &Path) -> StationConfig {
    if path.exists() {
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config: {e}");
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config: {e}");
            }
        }
    }
    StationConfig::default()
}

/// Save config to the default location.
pub fn save(config: &StationConfig) -> Result<()> {
    save_to(config, &config_path())
}

/// Save config to a specific path, creating parent directories as needed.
pub fn save_to(config: &StationConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write config: {}", path.display()))?;
    Ok(())
}
