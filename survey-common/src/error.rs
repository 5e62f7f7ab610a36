//! Common error types for the survey backend

use thiserror::Error;

/// Common result type for survey operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the session store and the HTTP API
#[derive(Error, Debug)]
pub enum Error {
    /// Client supplied an unusable argument (e.g. empty participant id)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Requested session does not exist or could not be read
    #[error("Not found: {0}")]
    NotFound(String),

    /// Aggregate read/write failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors caused by the caller rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidArgument(_) | Error::NotFound(_))
    }
}
