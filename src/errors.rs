/*!
 * Error types for the confessions backend.
 *
 * This module contains custom error types for the moderation workflow,
 * the push delivery client and the application shell, using the thiserror
 * crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors surfaced by confession store operations and moderation transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfessionError {
    /// No live confession carries the requested id
    #[error("Could not find the confession {0}")]
    NotFound(i64),

    /// The record is not in a state that allows the requested operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The submitted record is malformed
    #[error("Invalid confession: {0}")]
    Validation(String),

    /// Any failure of the underlying store
    #[error("Store error: {0}")]
    Store(String),
}

impl ConfessionError {
    /// True when the error came from the store rather than from the workflow rules
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

// Typed errors raised inside a store closure travel through anyhow;
// recover them here and wrap everything else as a store failure.
impl From<anyhow::Error> for ConfessionError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<ConfessionError>() {
            Ok(typed) => typed,
            Err(other) => Self::Store(format!("{:#}", other)),
        }
    }
}

impl From<rusqlite::Error> for ConfessionError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Store(error.to_string())
    }
}

/// Errors that can occur when delivering a push notification
#[derive(Error, Debug)]
pub enum PushError {
    /// The HTTP request could not be sent or timed out
    #[error("Push request failed: {0}")]
    RequestFailed(String),

    /// The push service answered with a non-success status
    #[error("Push service responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Response body returned by the service
        message: String,
    },

    /// The stored payload could not be encoded or decoded
    #[error("Invalid push payload: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PushError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Configuration is missing or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the moderation workflow
    #[error("Confession error: {0}")]
    Confession(#[from] ConfessionError),

    /// Error from push delivery
    #[error("Push error: {0}")]
    Push(#[from] PushError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
