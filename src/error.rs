//! Error types for fixlink.

use thiserror::Error;

/// Main error type for all fixlink operations.
#[derive(Debug, Error)]
pub enum FixlinkError {
    /// I/O error on the byte channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while building a reply body.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Serial line operation failed (open, baud switch).
    #[error("Serial error: {0}")]
    Serial(String),

    /// Registration rejected: a handler for this method already exists.
    #[error("Method already registered: {0}")]
    AlreadyRegistered(String),

    /// Registration rejected: empty method name.
    #[error("Invalid method name")]
    InvalidMethod,
}

/// Result type alias using FixlinkError.
pub type Result<T> = std::result::Result<T, FixlinkError>;
