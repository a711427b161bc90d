//! WanSight Bridge Framework
//!
//! Common abstractions for building bridges that publish router state.
//!
//! # Overview
//!
//! This framework provides:
//! - [`Sink`] as the single publication seam, with [`ZenohSink`], [`LogSink`]
//!   and [`MemorySink`] implementations
//! - [`Reporter`] for fire-and-forget publishing with logged failures
//! - [`Availability`] for retained online/offline presence announcements
//! - [`BridgeRunner`] for managing bridge lifecycle (connection, tasks, shutdown)
//! - [`BridgeArgs`] for common CLI argument parsing
//!
//! # Example
//!
//! ```ignore
//! use wansight_bridge_framework::{BridgeArgs, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut runner = BridgeRunner::connect("mybridge", &config, &args).await?;
//!
//!     // Spawn workers
//!     runner.spawn(my_worker(runner.reporter()));
//!
//!     // Run until Ctrl+C
//!     runner.run().await?;
//!     Ok(())
//! }
//! ```

mod args;
mod availability;
mod config;
mod error;
mod publisher;
mod reporter;
mod retained;
mod runner;
mod sink;

pub use args::BridgeArgs;
pub use availability::{Availability, AvailabilityState};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use publisher::ZenohSink;
pub use reporter::{PublishStats, Reporter};
pub use retained::{RetainedConfig, RetainedPublishers};
pub use runner::BridgeRunner;
pub use sink::{LogSink, MemorySink, Publication, Sink};

// Re-export commonly used types from wansight-common
pub use wansight_common::{
    Component, LogFormat, LoggingConfig, Metric, TopicBuilder, ZenohConfig, init_tracing,
};
