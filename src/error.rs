use reqwest::StatusCode;
use reqwest_eventsource::Error as EventSourceError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

// Enum for handling various application-level errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("AI error: {0}")]
    AI(#[from] AIError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

// Startup errors. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("⚠️ Secret key not found! Please create a `secrets.toml` file at {}.", path.display())]
    StoreMissing { path: PathBuf },

    #[error("⚠️ Key `{key}` not found in secrets.toml.")]
    KeyMissing { key: &'static str },

    #[error("Could not parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Could not find the home directory")]
    NoHomeDir,

    #[error("Invalid settings file: {0}")]
    Settings(#[from] serde_json::Error),
}

// Errors raised while talking to the model.
#[derive(Debug, Error)]
pub enum AIError {
    #[error("429 Too Many Requests: {message}")]
    RateLimited { message: String },

    #[error("Gemini API error: {status} - {message}")]
    Api { status: StatusCode, message: String },

    #[error("Gemini stream error {code} ({status}): {message}")]
    Stream {
        code: u16,
        status: String,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Event stream error: {0}")]
    EventSource(#[from] reqwest_eventsource::Error),

    #[error("Failed to decode Gemini response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl AIError {
    /// Whether the failure means "slow down" rather than "this turn is broken".
    ///
    /// Structured codes are checked first. Only errors that carry nothing but
    /// text fall back to looking for a 429 marker in the message.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            AIError::RateLimited { .. } => true,
            AIError::Api { status, .. } => *status == StatusCode::TOO_MANY_REQUESTS,
            AIError::Stream { code, status, .. } => {
                *code == StatusCode::TOO_MANY_REQUESTS.as_u16() || status == "RESOURCE_EXHAUSTED"
            }
            AIError::Http(err) => err.status() == Some(StatusCode::TOO_MANY_REQUESTS),
            AIError::EventSource(err) => match err {
                EventSourceError::InvalidStatusCode(status, _) => {
                    *status == StatusCode::TOO_MANY_REQUESTS
                }
                EventSourceError::Transport(err) => {
                    err.status() == Some(StatusCode::TOO_MANY_REQUESTS)
                }
                _ => false,
            },
            AIError::Decode(_) => false,
            AIError::Other(message) => mentions_rate_limit(message),
        }
    }
}

fn mentions_rate_limit(message: &str) -> bool {
    message.contains("429") || message.contains("RESOURCE_EXHAUSTED")
}

// Reasons a chat submission does not start a turn.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Nothing to send")]
    Empty,

    #[error("Sentinel-X is still answering")]
    TurnInProgress,
}
