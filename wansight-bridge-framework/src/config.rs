//! Configuration traits.

use crate::{LoggingConfig, ZenohConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's resolved configuration to hand the
/// runner its bus connection and logging setup.
///
/// # Example
///
/// ```ignore
/// use wansight_bridge_framework::{BridgeConfig, LoggingConfig, ZenohConfig};
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn zenoh(&self) -> ZenohConfig {
///         ZenohConfig::tcp("client", &self.host, self.port)
///     }
///
///     fn logging(&self) -> LoggingConfig {
///         LoggingConfig::for_verbosity(self.verbose, self.log_format)
///     }
/// }
/// ```
pub trait BridgeConfig {
    /// Get the Zenoh configuration.
    fn zenoh(&self) -> ZenohConfig;

    /// Get the logging configuration.
    fn logging(&self) -> LoggingConfig;
}
