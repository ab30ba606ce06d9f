//! Custom error types for tubedigest

use crate::meta::Status;
use thiserror::Error;

/// Main error type for tubedigest operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Invalid status transition for {video}: {from} -> {to}")]
    InvalidTransition {
        video: String,
        from: Status,
        to: Status,
    },

    #[error("Video {video} is no longer claimed (now {status})")]
    ClaimLost { video: String, status: Status },

    #[error("Not initialized: run 'tubedigest init' first")]
    NotInitialized,

    #[error("Already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl Error {
    /// Whether the error only means another worker or a sweep took the item
    pub fn is_claim_conflict(&self) -> bool {
        matches!(
            self,
            Error::ClaimLost { .. } | Error::InvalidTransition { .. } | Error::VideoNotFound(_)
        )
    }
}

/// Result type alias for tubedigest
pub type Result<T> = std::result::Result<T, Error>;
