use thiserror::Error;

/// Common error type for WanSight components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid topic level: {0:?}")]
    TopicLevel(String),
}

/// Result type alias using WanSight's Error.
pub type Result<T> = std::result::Result<T, Error>;
