//! Common error types for Vigil

use thiserror::Error;

/// Common result type for Vigil operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the relay and viewer crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// WebSocket or channel transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
