//! Error types for the telemetry bridge

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] warp::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Write to viewer timed out after {timeout_ms}ms")]
    WriteTimeout { timeout_ms: u64 },
}

/// Delivery failures reported by the connection registry
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Client {0} not found")]
    NotFound(String),

    /// The viewer's queue was closed or full; the entry has been pruned
    #[error("Client {0} disconnected")]
    Disconnected(String),

    #[error("Maximum connections reached ({0})")]
    LimitReached(usize),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
