//! Slow polling loop: interface addresses.

use std::sync::Arc;
use std::time::Duration;

use wansight_bridge_framework::{Metric, PublishStats, Reporter, TopicBuilder};

use crate::accessor::{AddressFamily, DeviceAccessor, Reading};
use crate::config::ResolvedConfig;

/// Default cadence of the slow loop.
pub const SLOW_INTERVAL: Duration = Duration::from_secs(60);

/// Published when an address cannot be looked up.
pub const UNAVAILABLE: &str = "unavailable";

/// Republishes monitored addresses on every tick. Holds no state.
pub struct SlowPoller {
    config: Arc<ResolvedConfig>,
    accessor: Arc<dyn DeviceAccessor>,
    reporter: Reporter,
    topics: TopicBuilder,
    interval: Duration,
}

impl SlowPoller {
    pub fn new(
        config: Arc<ResolvedConfig>,
        accessor: Arc<dyn DeviceAccessor>,
        reporter: Reporter,
    ) -> Self {
        let topics = config.topics();
        Self {
            config,
            accessor,
            reporter,
            topics,
            interval: SLOW_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Starting slow poller");

        loop {
            let stats = self.tick().await;
            tracing::debug!(
                published = stats.success,
                failed = stats.failed,
                "Slow poll complete"
            );
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Publish every monitored address once.
    pub async fn tick(&self) -> PublishStats {
        let mut stats = PublishStats::default();

        for interface in self.config.base().filter(|i| i.monitor_ipv4) {
            stats.record(self.publish_address(&interface.name, AddressFamily::V4).await);
        }

        for interface in self.config.base().filter(|i| i.monitor_ipv6) {
            stats.record(self.publish_address(&interface.name, AddressFamily::V6).await);
        }

        for interface in self.config.virtuals().filter(|i| i.monitor_ipv6) {
            stats.record(self.publish_address(&interface.name, AddressFamily::V6).await);
        }

        stats
    }

    async fn publish_address(&self, interface: &str, family: AddressFamily) -> bool {
        let metric = match family {
            AddressFamily::V4 => Metric::Ipv4,
            AddressFamily::V6 => Metric::Ipv6,
        };

        let address = match self.accessor.ip_address(interface, family).await {
            Reading::Available(address) => address,
            Reading::Unavailable => {
                tracing::debug!(interface = %interface, family = ?family, "No address");
                UNAVAILABLE.to_string()
            }
        };

        let topic = self.topics.metric(interface, metric);
        self.reporter.publish(&topic, address, false).await
    }
}
