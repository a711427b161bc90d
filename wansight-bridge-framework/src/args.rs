//! CLI argument parsing for bridges.

use clap::Args;

use wansight_common::LoggingConfig;

/// Common CLI arguments for all bridges.
///
/// Bridges embed this with `#[command(flatten)]` next to their own options.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeArgs {
    /// Verbose logging; takes precedence over the configured verbosity.
    #[arg(short, long)]
    pub verbose: bool,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log publications instead of connecting to the bus.
    #[arg(long)]
    pub dry_run: bool,
}

impl BridgeArgs {
    /// Apply the CLI log level override to a configured logging setup.
    pub fn logging(&self, configured: LoggingConfig) -> LoggingConfig {
        match &self.log_level {
            Some(level) => LoggingConfig {
                level: level.clone(),
                ..configured
            },
            None => configured,
        }
    }
}
