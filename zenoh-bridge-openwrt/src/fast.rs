//! Fast polling loop: link state, mwan3 status, counters and rates.

use std::sync::Arc;
use std::time::{Duration, Instant};

use wansight_bridge_framework::{Availability, Metric, PublishStats, Reporter, TopicBuilder};

use crate::accessor::{DeviceAccessor, Direction, MwanSnapshot, MwanState, OperState, Reading};
use crate::config::{InterfaceConfig, ResolvedConfig};
use crate::rates::RateTracker;

/// Default cadence of the fast loop.
pub const FAST_INTERVAL: Duration = Duration::from_secs(5);

/// Published as the active uplink when mwan3 reports none online.
pub const UNKNOWN_UPLINK: &str = "unknown";

/// Drives link, status, counter and rate publication.
pub struct FastPoller {
    config: Arc<ResolvedConfig>,
    accessor: Arc<dyn DeviceAccessor>,
    reporter: Reporter,
    availability: Availability,
    topics: TopicBuilder,
    rates: RateTracker,
    interval: Duration,
}

impl FastPoller {
    pub fn new(
        config: Arc<ResolvedConfig>,
        accessor: Arc<dyn DeviceAccessor>,
        reporter: Reporter,
        availability: Availability,
    ) -> Self {
        let topics = config.topics();
        Self {
            config,
            accessor,
            reporter,
            availability,
            topics,
            rates: RateTracker::new(),
            interval: FAST_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn rates(&self) -> &RateTracker {
        &self.rates
    }

    /// Announce availability, then poll forever.
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            interfaces = self.config.interfaces.len(),
            "Starting fast poller"
        );

        self.availability.announce_online().await;

        loop {
            let stats = self.tick(Instant::now()).await;
            tracing::debug!(
                published = stats.success,
                failed = stats.failed,
                "Fast poll complete"
            );
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One pass over every interface plus the active uplink.
    pub async fn tick(&self, now: Instant) -> PublishStats {
        let mut stats = PublishStats::default();
        let mwan = self.accessor.mwan_status().await;

        for interface in self.config.base() {
            stats.merge(self.poll_base(interface, &mwan, now).await);
        }

        for interface in self.config.virtuals() {
            stats.merge(self.poll_virtual(interface).await);
        }

        stats.merge(self.publish_active_uplink().await);
        stats
    }

    async fn poll_base(
        &self,
        interface: &InterfaceConfig,
        mwan: &MwanSnapshot,
        now: Instant,
    ) -> PublishStats {
        let name = interface.name.as_str();
        let mut stats = PublishStats::default();

        let Some(device) = self.accessor.device_of(name).await else {
            tracing::debug!(interface = %name, "No kernel device, interface is down");
            let status = mwan.state_or(name, MwanState::Offline);
            stats.record(self.publish(name, Metric::LinkStatus, "down").await);
            stats.record(self.publish(name, Metric::Status, status).await);
            return stats;
        };

        let link = match self.accessor.oper_state(&device).await {
            Reading::Available(state) => state,
            Reading::Unavailable => {
                tracing::warn!(interface = %name, device = %device, "Operstate unavailable");
                OperState::Down
            }
        };
        stats.record(self.publish(name, Metric::LinkStatus, &link).await);

        let status = mwan.state_or(name, MwanState::Unknown);
        stats.record(self.publish(name, Metric::Status, status).await);

        let rx = self.accessor.byte_counter(&device, Direction::Rx).await;
        let tx = self.accessor.byte_counter(&device, Direction::Tx).await;
        let derived = self.rates.observe(name, rx, tx, now).await;

        for (metric, value) in [
            (Metric::RxBytes, derived.rx_bytes),
            (Metric::TxBytes, derived.tx_bytes),
            (Metric::RxRate, derived.rx_rate),
            (Metric::TxRate, derived.tx_rate),
        ] {
            if let Some(value) = value {
                stats.record(self.publish(name, metric, value).await);
            }
        }

        stats
    }

    async fn poll_virtual(&self, interface: &InterfaceConfig) -> PublishStats {
        let name = interface.name.as_str();
        let mut stats = PublishStats::default();

        let online = match self.accessor.device_of(name).await {
            Some(device) => {
                self.accessor.oper_state(&device).await == Reading::Available(OperState::Up)
            }
            None => false,
        };

        let status = if online {
            MwanState::Online
        } else {
            MwanState::Offline
        };
        stats.record(self.publish(name, Metric::Status, status).await);
        stats
    }

    async fn publish_active_uplink(&self) -> PublishStats {
        let mut stats = PublishStats::default();
        let active = self.accessor.active_uplink().await;
        let name = active.as_deref().unwrap_or(UNKNOWN_UPLINK);
        let label = self.config.label_of(name);

        stats.record(
            self.reporter
                .publish(&self.topics.group(Metric::Active), name, false)
                .await,
        );
        stats.record(
            self.reporter
                .publish(&self.topics.group(Metric::ActiveName), label, false)
                .await,
        );
        stats
    }

    async fn publish(&self, interface: &str, metric: Metric, value: impl std::fmt::Display) -> bool {
        let topic = self.topics.metric(interface, metric);
        self.reporter.publish(&topic, value, false).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use wansight_bridge_framework::MemorySink;

    use super::*;
    use crate::accessor::{AddressFamily, parse_mwan_status};

    /// Accessor with scripted answers; counters can be changed between ticks.
    #[derive(Default)]
    struct FakeAccessor {
        devices: HashMap<String, String>,
        oper: HashMap<String, OperState>,
        counters: Mutex<HashMap<(String, &'static str), u64>>,
        mwan: String,
    }

    impl FakeAccessor {
        fn device(mut self, interface: &str, device: &str, state: OperState) -> Self {
            self.devices.insert(interface.to_string(), device.to_string());
            self.oper.insert(device.to_string(), state);
            self
        }

        fn mwan(mut self, output: &str) -> Self {
            self.mwan = output.to_string();
            self
        }

        fn set_counter(&self, device: &str, direction: Direction, value: u64) {
            self.counters
                .lock()
                .unwrap()
                .insert((device.to_string(), direction.as_str()), value);
        }
    }

    #[async_trait]
    impl DeviceAccessor for FakeAccessor {
        async fn device_of(&self, interface: &str) -> Option<String> {
            self.devices.get(interface).cloned()
        }

        async fn oper_state(&self, device: &str) -> Reading<OperState> {
            self.oper.get(device).cloned().into()
        }

        async fn byte_counter(&self, device: &str, direction: Direction) -> Reading<u64> {
            self.counters
                .lock()
                .unwrap()
                .get(&(device.to_string(), direction.as_str()))
                .copied()
                .into()
        }

        async fn mwan_status(&self) -> MwanSnapshot {
            parse_mwan_status(&self.mwan)
        }

        async fn active_uplink(&self) -> Option<String> {
            crate::accessor::parse_active_uplink(&self.mwan)
        }

        async fn ip_address(&self, _interface: &str, _family: AddressFamily) -> Reading<String> {
            Reading::Unavailable
        }
    }

    fn make_poller(accessor: Arc<FakeAccessor>, sink: Arc<MemorySink>) -> FastPoller {
        let config = Arc::new(ResolvedConfig::builtin(false));
        let reporter = Reporter::new(sink);
        let availability = Availability::new(reporter.clone(), config.availability_topics());
        FastPoller::new(config, accessor, reporter, availability)
    }

    fn last(sink: &MemorySink, topic: &str) -> Option<String> {
        sink.last(topic).map(|p| p.payload)
    }

    #[tokio::test]
    async fn test_base_interface_without_device() {
        let accessor = Arc::new(FakeAccessor::default().mwan("interface wanb is online\n"));
        let sink = Arc::new(MemorySink::new());
        let poller = make_poller(accessor, sink.clone());

        poller.tick(Instant::now()).await;

        assert_eq!(last(&sink, "openwrt/wan/link_status").as_deref(), Some("down"));
        assert_eq!(last(&sink, "openwrt/wan/status").as_deref(), Some("offline"));
        assert_eq!(last(&sink, "openwrt/wanb/link_status").as_deref(), Some("down"));
        assert_eq!(last(&sink, "openwrt/wanb/status").as_deref(), Some("online"));
        assert_eq!(sink.count_with_prefix("openwrt/wan/rx_"), 0);
        assert_eq!(sink.count_with_prefix("openwrt/wan/tx_"), 0);
        assert_eq!(sink.count_with_prefix("openwrt/wanb/rx_"), 0);
    }

    #[tokio::test]
    async fn test_base_interface_counters_and_rates() {
        let accessor = Arc::new(
            FakeAccessor::default()
                .device("wan", "eth1", OperState::Up)
                .mwan("interface wan is online\n"),
        );
        accessor.set_counter("eth1", Direction::Rx, 1000);
        accessor.set_counter("eth1", Direction::Tx, 2000);
        let sink = Arc::new(MemorySink::new());
        let poller = make_poller(accessor.clone(), sink.clone());
        let t0 = Instant::now();

        poller.tick(t0).await;
        assert_eq!(last(&sink, "openwrt/wan/link_status").as_deref(), Some("up"));
        assert_eq!(last(&sink, "openwrt/wan/status").as_deref(), Some("online"));
        assert_eq!(last(&sink, "openwrt/wan/rx_bytes").as_deref(), Some("1000"));
        assert!(last(&sink, "openwrt/wan/rx_rate").is_none());

        accessor.set_counter("eth1", Direction::Rx, 1500);
        accessor.set_counter("eth1", Direction::Tx, 1900);
        poller.tick(t0 + Duration::from_secs(5)).await;

        assert_eq!(last(&sink, "openwrt/wan/rx_bytes").as_deref(), Some("1500"));
        assert_eq!(last(&sink, "openwrt/wan/rx_rate").as_deref(), Some("100"));
        assert_eq!(last(&sink, "openwrt/wan/tx_bytes").as_deref(), Some("1900"));
        assert!(last(&sink, "openwrt/wan/tx_rate").is_none());
    }

    #[tokio::test]
    async fn test_unknown_mwan_state_and_unreadable_counters() {
        let accessor = Arc::new(FakeAccessor::default().device(
            "wan",
            "eth1",
            OperState::Other("lowerlayerdown".to_string()),
        ));
        let sink = Arc::new(MemorySink::new());
        let poller = make_poller(accessor, sink.clone());

        poller.tick(Instant::now()).await;

        assert_eq!(
            last(&sink, "openwrt/wan/link_status").as_deref(),
            Some("lowerlayerdown")
        );
        assert_eq!(last(&sink, "openwrt/wan/status").as_deref(), Some("unknown"));
        assert_eq!(sink.count_with_prefix("openwrt/wan/rx_"), 0);
        assert_eq!(sink.count_with_prefix("openwrt/wan/tx_"), 0);
        assert!(poller.rates().prior("wan").await.is_none());
    }

    #[tokio::test]
    async fn test_unavailable_operstate_publishes_down() {
        let mut accessor = FakeAccessor::default();
        accessor.devices.insert("wan".to_string(), "gone0".to_string());
        let sink = Arc::new(MemorySink::new());
        let poller = make_poller(Arc::new(accessor), sink.clone());

        poller.tick(Instant::now()).await;

        assert_eq!(last(&sink, "openwrt/wan/link_status").as_deref(), Some("down"));
    }

    #[tokio::test]
    async fn test_virtual_interface_status() {
        let accessor = Arc::new(FakeAccessor::default().device("wan6", "eth1", OperState::Up));
        let sink = Arc::new(MemorySink::new());
        let poller = make_poller(accessor, sink.clone());

        poller.tick(Instant::now()).await;
        assert_eq!(last(&sink, "openwrt/wan6/status").as_deref(), Some("online"));
        assert!(last(&sink, "openwrt/wan6/link_status").is_none());
        assert_eq!(sink.count_with_prefix("openwrt/wan6/rx_"), 0);

        let accessor = Arc::new(FakeAccessor::default().device(
            "wan6",
            "eth1",
            OperState::Other("unknown".to_string()),
        ));
        let sink = Arc::new(MemorySink::new());
        let poller = make_poller(accessor, sink.clone());

        poller.tick(Instant::now()).await;
        assert_eq!(last(&sink, "openwrt/wan6/status").as_deref(), Some("offline"));
    }

    #[tokio::test]
    async fn test_active_uplink() {
        let accessor = Arc::new(
            FakeAccessor::default().mwan("interface wan is offline\ninterface wanb is online\n"),
        );
        let sink = Arc::new(MemorySink::new());
        let poller = make_poller(accessor, sink.clone());

        poller.tick(Instant::now()).await;
        assert_eq!(last(&sink, "openwrt/mwan3/active").as_deref(), Some("wanb"));
        assert_eq!(
            last(&sink, "openwrt/mwan3/active_name").as_deref(),
            Some("Vodafone LTE")
        );

        let accessor = Arc::new(FakeAccessor::default().mwan("interface wan is offline\n"));
        let sink = Arc::new(MemorySink::new());
        let poller = make_poller(accessor, sink.clone());

        poller.tick(Instant::now()).await;
        assert_eq!(last(&sink, "openwrt/mwan3/active").as_deref(), Some("unknown"));
        assert_eq!(last(&sink, "openwrt/mwan3/active_name").as_deref(), Some("unknown"));
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_stop_tick() {
        let accessor = Arc::new(FakeAccessor::default());
        let sink = Arc::new(MemorySink::new());
        sink.fail_on("openwrt/wan/link_status");
        let poller = make_poller(accessor, sink.clone());

        let stats = poller.tick(Instant::now()).await;

        assert_eq!(stats.failed, 1);
        assert_eq!(last(&sink, "openwrt/wan/status").as_deref(), Some("offline"));
        assert_eq!(last(&sink, "openwrt/mwan3/active").as_deref(), Some("unknown"));
    }

    #[tokio::test]
    async fn test_state_publications_are_not_retained() {
        let accessor = Arc::new(FakeAccessor::default());
        let sink = Arc::new(MemorySink::new());
        let poller = make_poller(accessor, sink.clone());

        poller.tick(Instant::now()).await;
        assert!(sink.publications().iter().all(|p| !p.retain));
    }
}
