//! Device accessors.
//!
//! Every lookup fails independently and reports failure as a value
//! ([`Reading::Unavailable`], `None`, or an empty snapshot) instead of an
//! error, so one broken interface never aborts a polling tick.

use std::fmt;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Result of a lookup that may fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading<T> {
    Available(T),
    Unavailable,
}

impl<T> Reading<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Reading::Available(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Reading::Available(v) => Some(v),
            Reading::Unavailable => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reading<U> {
        match self {
            Reading::Available(v) => Reading::Available(f(v)),
            Reading::Unavailable => Reading::Unavailable,
        }
    }
}

impl<T> From<Option<T>> for Reading<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Reading::Available(v),
            None => Reading::Unavailable,
        }
    }
}

/// Kernel operational state of a network device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperState {
    Up,
    Down,
    /// Any other kernel state (`dormant`, `lowerlayerdown`, `unknown`...).
    Other(String),
}

impl OperState {
    /// Parse the content of a sysfs `operstate` file.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" => None,
            "up" => Some(OperState::Up),
            "down" => Some(OperState::Down),
            other => Some(OperState::Other(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OperState::Up => "up",
            OperState::Down => "down",
            OperState::Other(s) => s,
        }
    }
}

impl fmt::Display for OperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traffic direction of a byte counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rx,
    Tx,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Rx => "rx",
            Direction::Tx => "tx",
        }
    }
}

/// IP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Key of the address list in `ubus` interface status.
    pub fn status_key(&self) -> &'static str {
        match self {
            AddressFamily::V4 => "ipv4-address",
            AddressFamily::V6 => "ipv6-address",
        }
    }
}

/// Per-link state reported by mwan3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MwanState {
    Online,
    Offline,
    Unknown,
}

impl MwanState {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "online" => MwanState::Online,
            "offline" => MwanState::Offline,
            _ => MwanState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MwanState::Online => "online",
            MwanState::Offline => "offline",
            MwanState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MwanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-link mwan3 states from one `mwan3 status` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MwanSnapshot {
    entries: Vec<(String, MwanState)>,
}

impl MwanSnapshot {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// State of `interface`; a repeated line overrides earlier ones.
    pub fn get(&self, interface: &str) -> Option<MwanState> {
        self.entries
            .iter()
            .rev()
            .find(|(name, _)| name == interface)
            .map(|(_, state)| *state)
    }

    /// State of `interface`, or `default` when the output did not mention it.
    pub fn state_or(&self, interface: &str, default: MwanState) -> MwanState {
        self.get(interface).unwrap_or(default)
    }
}

static STATUS_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)interface\s+(\S+)\s+is\s+(\w+)").unwrap());

static ONLINE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)interface\s+(\S+)\s+is\s+online\b").unwrap());

/// Parse `mwan3 status` output into per-link states.
pub fn parse_mwan_status(output: &str) -> MwanSnapshot {
    let entries = output
        .lines()
        .filter_map(|line| STATUS_LINE.captures(line))
        .map(|caps| (caps[1].to_string(), MwanState::parse(&caps[2])))
        .collect();
    MwanSnapshot { entries }
}

/// First link reported online in `mwan3 status` output.
pub fn parse_active_uplink(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| ONLINE_LINE.captures(line))
        .map(|caps| caps[1].to_string())
}

/// Kernel device of an interface from its `ubus` status.
pub fn parse_l3_device(status: &Value) -> Option<String> {
    status
        .get("l3_device")
        .and_then(Value::as_str)
        .filter(|dev| !dev.is_empty())
        .map(str::to_string)
}

/// First address of `family` from an interface's `ubus` status.
///
/// A missing or non-list address field reads as unavailable.
pub fn parse_ip_address(status: &Value, family: AddressFamily) -> Reading<String> {
    status
        .get(family.status_key())
        .and_then(Value::as_array)
        .and_then(|entries| {
            entries
                .iter()
                .find_map(|entry| entry.get("address").and_then(Value::as_str))
        })
        .map(str::to_string)
        .into()
}

/// Queries against the router's interfaces.
#[async_trait]
pub trait DeviceAccessor: Send + Sync {
    /// Kernel device backing `interface`, or `None` when it has none.
    async fn device_of(&self, interface: &str) -> Option<String>;

    /// Operational state of a kernel device.
    async fn oper_state(&self, device: &str) -> Reading<OperState>;

    /// Cumulative byte counter of a kernel device.
    async fn byte_counter(&self, device: &str, direction: Direction) -> Reading<u64>;

    /// Current mwan3 per-link states; empty when mwan3 cannot be queried.
    async fn mwan_status(&self) -> MwanSnapshot;

    /// The link mwan3 currently routes through.
    async fn active_uplink(&self) -> Option<String>;

    /// First configured address of `interface` for `family`.
    async fn ip_address(&self, interface: &str, family: AddressFamily) -> Reading<String>;
}
