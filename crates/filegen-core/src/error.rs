//! Core error types for filegen-core

use std::time::Duration;

use thiserror::Error;

/// Errors returned by the manager's public contract
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Machine not found in registry
    #[error("machine not found: {0}")]
    MachineNotFound(String),

    /// Machine already exists in registry
    #[error("machine already exists: {0}")]
    MachineAlreadyExists(String),

    /// Actor communication error
    #[error("actor communication error: {0}")]
    ActorError(String),
}

/// Errors establishing a session with a source
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Dial did not complete in time
    #[error("connecting to {endpoint} timed out after {timeout:?}")]
    Timeout {
        /// Source being dialed
        endpoint: String,
        /// Dial timeout that was exceeded
        timeout: Duration,
    },

    /// Dial was refused or failed
    #[error("connecting to {endpoint} failed: {reason}")]
    ConnectionFailed {
        /// Source being dialed
        endpoint: String,
        /// Underlying error
        reason: String,
    },
}
