//! Error types for the quorum invoker.

use thiserror::Error;

/// Quorum invoker error type.
#[derive(Error, Debug)]
pub enum InvokerError {
    /// Configuration error (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failed to bind the inbound channel
    #[error("Failed to bind inbound channel at {path}: {source}")]
    Bind {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error (socket, file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Inbound message is neither the sentinel nor a JSON object
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Protocol error (invalid frames, oversized data)
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// HTTP transport error while submitting an invocation
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The invocation endpoint rejected the submission
    #[error("Invocation of {function} rejected with status {status}")]
    Submission { function: String, status: u16 },
}

/// Result type for quorum invoker operations.
pub type InvokerResult<T> = Result<T, InvokerError>;
