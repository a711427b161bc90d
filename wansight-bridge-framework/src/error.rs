//! Error types for the bridge framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur in a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Zenoh connection error.
    #[error("Zenoh connection error: {0}")]
    ZenohConnection(String),

    /// Publishing error.
    #[error("Failed to publish to {key}: {message}")]
    Publish { key: String, message: String },
}

impl BridgeError {
    /// Create a publish error for `key`.
    pub fn publish(key: impl Into<String>, message: impl ToString) -> Self {
        Self::Publish {
            key: key.into(),
            message: message.to_string(),
        }
    }
}
