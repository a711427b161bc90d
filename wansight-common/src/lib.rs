//! WanSight Common Library
//!
//! This crate provides shared types and utilities for WanSight router bridges:
//!
//! - [`config`] - Bus connection and logging configuration
//! - [`session`] - Zenoh session management
//! - [`topic`] - State and discovery topic builders
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod session;
pub mod topic;

// Re-export commonly used types at the crate root
pub use config::{Credentials, LogFormat, LoggingConfig, ZenohConfig};
pub use error::{Error, Result};
pub use session::connect;
pub use topic::{Component, GROUP, Metric, TopicBuilder, validate_level};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Supports two
/// output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// # Example
///
/// ```ignore
/// use wansight_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
