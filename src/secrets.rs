// secrets.rs

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const API_KEY_NAME: &str = "GEMINI_API_KEY";
pub const SECRETS_PATH_ENV: &str = "SENTINEL_SECRETS";

/// The Gemini credential. Never printed, never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        ApiKey(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// `$SENTINEL_SECRETS` if set, otherwise `secrets.toml` in the data directory.
pub fn secrets_path(data_dir: &Path) -> PathBuf {
    match std::env::var_os(SECRETS_PATH_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => data_dir.join("secrets.toml"),
    }
}

pub fn load_api_key(path: &Path) -> Result<ApiKey, ConfigError> {
    let data = fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ConfigError::StoreMissing {
            path: path.to_path_buf(),
        },
        _ => ConfigError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let table: toml::Table = data.parse().map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    table
        .get(API_KEY_NAME)
        .and_then(|value| value.as_str())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(ApiKey::new)
        .ok_or(ConfigError::KeyMissing { key: API_KEY_NAME })
}
