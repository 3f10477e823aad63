//! Error types for ChatDiary

use thiserror::Error;

/// Result type alias for ChatDiary operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while chatting, generating or persisting diaries
#[derive(Debug, Error)]
pub enum Error {
    /// No API key configured for the selected provider
    #[error("API Key is missing. Please check your settings.")]
    MissingApiKey,

    /// Provider answered with a non-success status (or an embedded error object)
    #[error("{provider} API Error ({status}): {body}")]
    Http {
        provider: String,
        status: u16,
        body: String,
    },

    /// Network-level failure talking to the provider
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response did not have the expected shape
    #[error("parse error: {0}")]
    Parse(String),

    /// Persisting a record failed (quota, locked database, ...)
    #[error("storage error: {0}")]
    Storage(String),

    /// Unknown diary, persona, config or message
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller supplied something unusable
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// JSON (de)serialization error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Status code of an HTTP failure, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
