use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// Non-secret application settings. Missing fields fall back to their defaults.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub model: String,
    pub api_base_url: String,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub debug_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            max_attempts: 3,
            base_delay_ms: 1000,
            debug_mode: false,
        }
    }
}

/// `~/sentinel/data`, home of the settings, the secrets and the log.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let home_dir = dir::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home_dir.join("sentinel").join("data"))
}

impl Settings {
    // Load settings from the data directory, writing the defaults out on first run.
    pub fn load_or_create(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join("settings.json");
        if path.exists() {
            return Self::load_settings_from_file(&path);
        }
        let settings = Self::default();
        settings.save_to_file(&path)?;
        Ok(settings)
    }

    pub fn load_settings_from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let data = serde_json::to_string_pretty(self)?;
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let mut file = fs::File::create(path).map_err(io_error)?;
        file.write_all(data.as_bytes()).map_err(io_error)?;
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }
}
