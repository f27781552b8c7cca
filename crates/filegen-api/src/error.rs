//! Error types for filegen-api

use thiserror::Error;

/// Errors raised while encoding or decoding protocol data
#[derive(Error, Debug)]
pub enum ProtoError {
    /// Underlying stream or framing failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame body is not a valid message
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Hash string is not 128 hex digits
    #[error("invalid hash: {0}")]
    InvalidHash(String),
}
