//! Error types for trackline-core

use thiserror::Error;

/// Main error type for the trackline-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error (preference store or offline cache)
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error, raised while building a tracker
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller supplied a visitor id that is not 16 lowercase hex characters
    #[error("invalid visitor id {0:?}: expected 16 lowercase hexadecimal characters")]
    InvalidVisitorId(String),

    /// A track helper was given arguments the collector would reject
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Packet transmission failed (connection, timeout, non-success status)
    #[error("transmission error: {0}")]
    Transmission(String),
}

/// Result type alias for trackline-core
pub type Result<T> = std::result::Result<T, Error>;
