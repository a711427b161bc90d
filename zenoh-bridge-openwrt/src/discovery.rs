//! Home Assistant discovery metadata.
//!
//! Payloads are a pure function of the resolved configuration and are
//! published once, retained, at startup.

use serde::Serialize;
use wansight_bridge_framework::{Component, Metric, PublishStats, Reporter, TopicBuilder};
use wansight_common::topic::GROUP;

use crate::config::{InterfaceConfig, ResolvedConfig};
use crate::fast::UNKNOWN_UPLINK;

const MANUFACTURER: &str = "OpenWrt";
const MODEL: &str = "WanSight OpenWrt Reporter";
const GROUP_DEVICE_NAME: &str = "MWAN3 Load Balancer";

/// Device grouping for a set of entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
}

/// One entity's discovery payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryPayload {
    pub name: String,
    pub state_topic: String,
    pub availability_topic: String,
    pub payload_available: &'static str,
    pub payload_not_available: &'static str,
    pub unique_id: String,
    pub icon: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub device: DeviceInfo,
}

/// A discovery payload and the topic it is published on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryMessage {
    pub topic: String,
    pub payload: DiscoveryPayload,
}

/// Static description of one entity kind.
struct Entity {
    metric: Metric,
    component: Component,
    name: &'static str,
    icon: &'static str,
    payload_on_off: Option<(&'static str, &'static str)>,
    unit: Option<&'static str>,
    device_class: Option<&'static str>,
}

impl Entity {
    const fn binary(
        metric: Metric,
        name: &'static str,
        icon: &'static str,
        on: &'static str,
        off: &'static str,
    ) -> Self {
        Self {
            metric,
            component: Component::BinarySensor,
            name,
            icon,
            payload_on_off: Some((on, off)),
            unit: None,
            device_class: Some("connectivity"),
        }
    }

    const fn sensor(
        metric: Metric,
        name: &'static str,
        icon: &'static str,
        unit: Option<&'static str>,
        device_class: Option<&'static str>,
    ) -> Self {
        Self {
            metric,
            component: Component::Sensor,
            name,
            icon,
            payload_on_off: None,
            unit,
            device_class,
        }
    }
}

const BASE_STATUS: Entity = Entity::binary(Metric::Status, "MWAN Status", "mdi:wan", "online", "offline");
const LINK_STATUS: Entity =
    Entity::binary(Metric::LinkStatus, "Link Status", "mdi:lan-connect", "up", "down");
const VIRTUAL_STATUS: Entity = Entity::binary(Metric::Status, "Status", "mdi:wan", "online", "offline");
const RX_BYTES: Entity =
    Entity::sensor(Metric::RxBytes, "RX Bytes", "mdi:counter", Some("B"), Some("data_size"));
const TX_BYTES: Entity =
    Entity::sensor(Metric::TxBytes, "TX Bytes", "mdi:counter", Some("B"), Some("data_size"));
const RX_RATE: Entity =
    Entity::sensor(Metric::RxRate, "RX Rate", "mdi:speedometer", Some("B/s"), Some("data_rate"));
const TX_RATE: Entity =
    Entity::sensor(Metric::TxRate, "TX Rate", "mdi:speedometer", Some("B/s"), Some("data_rate"));
const IPV4: Entity = Entity::sensor(Metric::Ipv4, "IPv4", "mdi:ip", None, None);
const IPV6: Entity = Entity::sensor(Metric::Ipv6, "IPv6", "mdi:ip", None, None);

/// Build every discovery message for `config`.
pub fn discovery_messages(config: &ResolvedConfig) -> Vec<DiscoveryMessage> {
    let topics = config.topics();
    let mut messages = Vec::new();

    for interface in config.base() {
        let mut entities = vec![&BASE_STATUS, &LINK_STATUS, &RX_BYTES, &RX_RATE, &TX_BYTES, &TX_RATE];
        if interface.monitor_ipv4 {
            entities.push(&IPV4);
        }
        if interface.monitor_ipv6 {
            entities.push(&IPV6);
        }
        messages.extend(
            entities
                .into_iter()
                .map(|entity| interface_message(&topics, interface, entity)),
        );
    }

    for interface in config.virtuals() {
        messages.push(interface_message(&topics, interface, &VIRTUAL_STATUS));
        if interface.monitor_ipv6 {
            messages.push(interface_message(&topics, interface, &IPV6));
        }
    }

    let mut names: Vec<String> = config.base().map(|i| i.name.clone()).collect();
    names.push(UNKNOWN_UPLINK.to_string());

    let mut labels: Vec<String> = Vec::new();
    for interface in config.base() {
        if !labels.contains(&interface.label) {
            labels.push(interface.label.clone());
        }
    }
    labels.push(UNKNOWN_UPLINK.to_string());

    messages.push(group_message(&topics, Metric::Active, "Active WAN", "mdi:network", names));
    messages.push(group_message(
        &topics,
        Metric::ActiveName,
        "Active WAN Name",
        "mdi:wan",
        labels,
    ));

    messages
}

/// Publish every discovery message, retained.
pub async fn publish_discovery(reporter: &Reporter, config: &ResolvedConfig) -> PublishStats {
    let mut stats = PublishStats::default();
    for message in discovery_messages(config) {
        stats.record(
            reporter
                .publish_json(&message.topic, &message.payload, true)
                .await,
        );
    }
    tracing::info!(
        published = stats.success,
        failed = stats.failed,
        "Published discovery metadata"
    );
    stats
}

fn interface_message(
    topics: &TopicBuilder,
    interface: &InterfaceConfig,
    entity: &Entity,
) -> DiscoveryMessage {
    let name = interface.name.as_str();
    DiscoveryMessage {
        topic: topics.discovery(entity.component, name, entity.metric),
        payload: DiscoveryPayload {
            name: format!("{} {}", interface.label, entity.name),
            state_topic: topics.metric(name, entity.metric),
            availability_topic: topics.metric(name, Metric::Availability),
            payload_available: "online",
            payload_not_available: "offline",
            unique_id: topics.unique_id(name, Some(entity.metric)),
            icon: entity.icon,
            payload_on: entity.payload_on_off.map(|(on, _)| on),
            payload_off: entity.payload_on_off.map(|(_, off)| off),
            unit_of_measurement: entity.unit,
            device_class: entity.device_class,
            options: None,
            device: DeviceInfo {
                identifiers: vec![topics.unique_id(name, None)],
                name: format!("{} Interface", interface.label),
                manufacturer: MANUFACTURER,
                model: MODEL,
            },
        },
    }
}

fn group_message(
    topics: &TopicBuilder,
    metric: Metric,
    name: &str,
    icon: &'static str,
    options: Vec<String>,
) -> DiscoveryMessage {
    DiscoveryMessage {
        topic: topics.discovery(Component::Sensor, GROUP, metric),
        payload: DiscoveryPayload {
            name: name.to_string(),
            state_topic: topics.group(metric),
            availability_topic: topics.group(Metric::Availability),
            payload_available: "online",
            payload_not_available: "offline",
            unique_id: topics.unique_id(GROUP, Some(metric)),
            icon,
            payload_on: None,
            payload_off: None,
            unit_of_measurement: None,
            device_class: None,
            options: Some(options),
            device: DeviceInfo {
                identifiers: vec![topics.unique_id(GROUP, None)],
                name: GROUP_DEVICE_NAME.to_string(),
                manufacturer: MANUFACTURER,
                model: MODEL,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;
    use wansight_bridge_framework::MemorySink;

    use super::*;

    fn find<'a>(messages: &'a [DiscoveryMessage], topic: &str) -> &'a DiscoveryPayload {
        &messages
            .iter()
            .find(|m| m.topic == topic)
            .unwrap_or_else(|| panic!("missing {topic}"))
            .payload
    }

    #[test]
    fn test_builtin_entity_set() {
        let messages = discovery_messages(&ResolvedConfig::builtin(false));

        // 2 base interfaces x 7 entities, wan6 x 2, mwan3 x 2
        assert_eq!(messages.len(), 18);
        assert!(
            messages
                .iter()
                .all(|m| m.topic.starts_with("homeassistant/") && m.topic.ends_with("/config"))
        );
        assert!(
            !messages
                .iter()
                .any(|m| m.topic == "homeassistant/sensor/openwrt_wan_ipv6/config")
        );
        assert!(
            !messages
                .iter()
                .any(|m| m.topic == "homeassistant/sensor/openwrt_wan6_ipv4/config")
        );
    }

    #[test]
    fn test_binary_sensor_payload() {
        let messages = discovery_messages(&ResolvedConfig::builtin(false));
        let status = find(&messages, "homeassistant/binary_sensor/openwrt_wan_status/config");

        assert_eq!(status.name, "StarNet MWAN Status");
        assert_eq!(status.state_topic, "openwrt/wan/status");
        assert_eq!(status.availability_topic, "openwrt/wan/availability");
        assert_eq!(status.unique_id, "openwrt_wan_status");
        assert_eq!(status.payload_on, Some("online"));
        assert_eq!(status.payload_off, Some("offline"));
        assert_eq!(status.device.identifiers, vec!["openwrt_wan"]);
        assert_eq!(status.device.name, "StarNet Interface");

        let link = find(&messages, "homeassistant/binary_sensor/openwrt_wanb_link_status/config");
        assert_eq!(link.payload_on, Some("up"));
        assert_eq!(link.name, "Vodafone LTE Link Status");
    }

    #[test]
    fn test_sensor_payload_json() {
        let messages = discovery_messages(&ResolvedConfig::builtin(false));
        let rate = find(&messages, "homeassistant/sensor/openwrt_wan_rx_rate/config");

        let json: Value = serde_json::to_value(rate).unwrap();
        assert_eq!(json["unit_of_measurement"], "B/s");
        assert_eq!(json["device_class"], "data_rate");
        assert_eq!(json["device"]["manufacturer"], "OpenWrt");
        assert!(json.get("payload_on").is_none());
        assert!(json.get("options").is_none());

        let ipv4 = find(&messages, "homeassistant/sensor/openwrt_wan_ipv4/config");
        let json: Value = serde_json::to_value(ipv4).unwrap();
        assert!(json.get("unit_of_measurement").is_none());
        assert!(json.get("device_class").is_none());
    }

    #[test]
    fn test_group_options() {
        let mut config = ResolvedConfig::builtin(false);
        config.interfaces[1].label = "StarNet".to_string();
        let messages = discovery_messages(&config);

        let active = find(&messages, "homeassistant/sensor/openwrt_mwan3_active/config");
        assert_eq!(
            active.options.as_deref(),
            Some(&["wan".to_string(), "wanb".to_string(), "unknown".to_string()][..])
        );
        assert_eq!(active.availability_topic, "openwrt/mwan3/availability");
        assert_eq!(active.device.identifiers, vec!["openwrt_mwan3"]);

        let active_name = find(&messages, "homeassistant/sensor/openwrt_mwan3_active_name/config");
        assert_eq!(
            active_name.options.as_deref(),
            Some(&["StarNet".to_string(), "unknown".to_string()][..])
        );
    }

    #[tokio::test]
    async fn test_publish_discovery_is_retained_json() {
        let sink = Arc::new(MemorySink::new());
        let reporter = Reporter::new(sink.clone());

        let stats = publish_discovery(&reporter, &ResolvedConfig::builtin(false)).await;

        assert_eq!(stats.success, 18);
        let publications = sink.publications();
        assert!(publications.iter().all(|p| p.retain));
        for publication in publications {
            let value: Value = serde_json::from_str(&publication.payload).unwrap();
            assert!(value["unique_id"].is_string());
        }
    }
}
