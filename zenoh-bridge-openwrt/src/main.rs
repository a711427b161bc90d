//! Zenoh bridge for OpenWrt uplink health.
//!
//! Publishes link state, throughput, addresses and mwan3 failover status
//! to Zenoh.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use wansight_bridge_framework::{Availability, BridgeArgs, BridgeConfig, BridgeRunner, init_tracing};

use zenoh_bridge_openwrt::accessor::DeviceAccessor;
use zenoh_bridge_openwrt::config::{CliOverrides, DEFAULT_PACKAGE, resolve_with_diagnostics};
use zenoh_bridge_openwrt::discovery::publish_discovery;
use zenoh_bridge_openwrt::fast::FastPoller;
use zenoh_bridge_openwrt::openwrt::{DEFAULT_SYSFS_ROOT, OpenWrtAccessor};
use zenoh_bridge_openwrt::slow::SlowPoller;
use zenoh_bridge_openwrt::source::{ConfigSource, FileSource, UciSource};

#[derive(Parser, Debug)]
#[command(name = "zenoh-bridge-openwrt", version, about)]
struct Cli {
    #[command(flatten)]
    bridge: BridgeArgs,

    /// UCI package holding the reporter configuration.
    #[arg(long, default_value = DEFAULT_PACKAGE)]
    package: String,

    /// Read saved `uci show` output from a file instead of running `uci`.
    #[arg(long)]
    uci_file: Option<PathBuf>,

    /// Root of the network device tree.
    #[arg(long, default_value = DEFAULT_SYSFS_ROOT)]
    sysfs_root: PathBuf,

    /// Upper bound on each `uci` / `ubus` / `mwan3` invocation, in seconds.
    #[arg(long, default_value_t = 10)]
    command_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command_timeout = Duration::from_secs(cli.command_timeout_secs);

    let source: Box<dyn ConfigSource> = match &cli.uci_file {
        Some(path) => Box::new(FileSource::new(path)),
        None => Box::new(UciSource::new(&cli.package).with_timeout(command_timeout)),
    };
    let overrides = CliOverrides {
        verbose: cli.bridge.verbose,
    };
    let resolution = resolve_with_diagnostics(source.as_ref(), &overrides);
    let config = resolution.config;

    init_tracing(&cli.bridge.logging(config.logging()))?;

    if let Some(reason) = &resolution.fallback {
        tracing::warn!(
            source = %source.describe(),
            error = %reason,
            "Using built-in default configuration"
        );
    }

    if !config.enabled {
        tracing::info!("Reporter disabled in configuration, exiting");
        return Ok(());
    }

    tracing::info!(
        host = %config.bus.host,
        port = config.bus.port,
        prefix = %config.bus.base_prefix,
        interfaces = ?config.interfaces.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
        "Resolved configuration"
    );

    let config = Arc::new(config);
    let runner = BridgeRunner::connect("openwrt", config.as_ref(), &cli.bridge).await?;
    let reporter = runner.reporter();
    let availability = Availability::new(reporter.clone(), config.availability_topics());
    let mut runner = runner.with_availability(availability.clone());

    publish_discovery(&reporter, &config).await;

    let accessor: Arc<dyn DeviceAccessor> =
        Arc::new(OpenWrtAccessor::new(&cli.sysfs_root, command_timeout));

    let fast = FastPoller::new(config.clone(), accessor.clone(), reporter.clone(), availability);
    let slow = SlowPoller::new(config, accessor, reporter);

    runner.spawn(fast.run());
    runner.spawn(slow.run());

    runner.run().await?;
    Ok(())
}
