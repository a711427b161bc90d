use std::fmt;

use crate::error::{Error, Result};

/// Topic level used for the aggregate multi-WAN group.
pub const GROUP: &str = "mwan3";

/// Default base prefix for published state.
pub const DEFAULT_BASE_PREFIX: &str = "openwrt";

/// Default prefix for discovery metadata.
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

/// Metric keys, the last level of every state topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Availability,
    LinkStatus,
    Status,
    RxBytes,
    TxBytes,
    RxRate,
    TxRate,
    Ipv4,
    Ipv6,
    Active,
    ActiveName,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Availability => "availability",
            Metric::LinkStatus => "link_status",
            Metric::Status => "status",
            Metric::RxBytes => "rx_bytes",
            Metric::TxBytes => "tx_bytes",
            Metric::RxRate => "rx_rate",
            Metric::TxRate => "tx_rate",
            Metric::Ipv4 => "ipv4",
            Metric::Ipv6 => "ipv6",
            Metric::Active => "active",
            Metric::ActiveName => "active_name",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discovery component kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    BinarySensor,
    Sensor,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::BinarySensor => "binary_sensor",
            Component::Sensor => "sensor",
        }
    }
}

/// Check that `level` can be used as a single topic level.
///
/// Rejects empty strings and characters that carry meaning in Zenoh key
/// expressions or MQTT topic filters.
pub fn validate_level(level: &str) -> Result<()> {
    if level.is_empty() || level.contains(['/', '*', '$', '#', '?', '+']) {
        return Err(Error::TopicLevel(level.to_string()));
    }
    Ok(())
}

/// Builder for state and discovery topics.
///
/// State topics follow `<base>/<interface>/<metric>`, the aggregate group
/// lives under `<base>/mwan3/<metric>`, and discovery metadata under
/// `<discovery>/<component>/<base>_<interface>_<metric>/config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicBuilder {
    base: String,
    discovery: String,
}

impl TopicBuilder {
    pub fn new(base: impl Into<String>, discovery: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            discovery: discovery.into(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// State topic for an interface metric.
    ///
    /// # Example
    /// ```
    /// use wansight_common::topic::{Metric, TopicBuilder};
    ///
    /// let topics = TopicBuilder::new("openwrt", "homeassistant");
    /// assert_eq!(topics.metric("wan", Metric::RxRate), "openwrt/wan/rx_rate");
    /// ```
    pub fn metric(&self, interface: &str, metric: Metric) -> String {
        format!("{}/{}/{}", self.base, interface, metric.as_str())
    }

    /// State topic for the aggregate group.
    ///
    /// # Example
    /// ```
    /// use wansight_common::topic::{Metric, TopicBuilder};
    ///
    /// let topics = TopicBuilder::new("openwrt", "homeassistant");
    /// assert_eq!(topics.group(Metric::Active), "openwrt/mwan3/active");
    /// ```
    pub fn group(&self, metric: Metric) -> String {
        self.metric(GROUP, metric)
    }

    /// Identifier shared by discovery unique ids and device identifiers.
    pub fn unique_id(&self, interface: &str, metric: Option<Metric>) -> String {
        match metric {
            Some(metric) => format!("{}_{}_{}", self.base, interface, metric.as_str()),
            None => format!("{}_{}", self.base, interface),
        }
    }

    /// Discovery topic for one metric of one interface.
    ///
    /// # Example
    /// ```
    /// use wansight_common::topic::{Component, Metric, TopicBuilder};
    ///
    /// let topics = TopicBuilder::new("openwrt", "homeassistant");
    /// assert_eq!(
    ///     topics.discovery(Component::Sensor, "wan", Metric::Ipv4),
    ///     "homeassistant/sensor/openwrt_wan_ipv4/config"
    /// );
    /// ```
    pub fn discovery(&self, component: Component, interface: &str, metric: Metric) -> String {
        format!(
            "{}/{}/{}/config",
            self.discovery,
            component.as_str(),
            self.unique_id(interface, Some(metric))
        )
    }
}

impl Default for TopicBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_PREFIX, DEFAULT_DISCOVERY_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_topics() {
        let topics = TopicBuilder::new("router", "ha");

        assert_eq!(topics.metric("wanb", Metric::LinkStatus), "router/wanb/link_status");
        assert_eq!(topics.metric("wan6", Metric::Ipv6), "router/wan6/ipv6");
        assert_eq!(topics.group(Metric::ActiveName), "router/mwan3/active_name");
        assert_eq!(topics.group(Metric::Availability), "router/mwan3/availability");
    }

    #[test]
    fn test_discovery_topics() {
        let topics = TopicBuilder::default();

        assert_eq!(
            topics.discovery(Component::BinarySensor, "wan", Metric::Status),
            "homeassistant/binary_sensor/openwrt_wan_status/config"
        );
        assert_eq!(topics.unique_id("wan", None), "openwrt_wan");
        assert_eq!(
            topics.unique_id("mwan3", Some(Metric::Active)),
            "openwrt_mwan3_active"
        );
    }

    #[test]
    fn test_validate_level() {
        assert!(validate_level("wan").is_ok());
        assert!(validate_level("wan_6-b").is_ok());
        assert!(validate_level("").is_err());
        assert!(validate_level("wan/6").is_err());
        assert!(validate_level("wan*").is_err());
        assert!(validate_level("$wan").is_err());
        assert!(validate_level("wan#").is_err());
    }
}
