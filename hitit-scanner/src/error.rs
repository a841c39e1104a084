//! Error types for hitit-scanner
//!
//! Errors stay inside collaborators and the API layer. The scanner session
//! turns every failure into a status message instead of returning it.

use thiserror::Error;

/// Main error type for hitit-scanner
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Outbound network request errors
    #[error("Network error: {0}")]
    Network(String),

    /// Preview audio decoding errors
    #[error("Audio decode error: {0}")]
    AudioDecode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Settings could not be read or written
    #[error("Settings error: {0}")]
    Settings(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation not valid in the current scanner state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<hitit_common::Error> for Error {
    fn from(err: hitit_common::Error) -> Self {
        match err {
            hitit_common::Error::Database(e) => Error::Database(e),
            hitit_common::Error::Io(e) => Error::Io(e),
            hitit_common::Error::Config(msg) => Error::Config(msg),
            hitit_common::Error::InvalidInput(msg) => Error::BadRequest(msg),
            other => Error::Internal(other.to_string()),
        }
    }
}

/// Convenience Result type using hitit-scanner Error
pub type Result<T> = std::result::Result<T, Error>;
