//! Configuration for the OpenWrt bridge.
//!
//! The configuration is resolved once at startup from a UCI-style key/value
//! source merged with built-in defaults, and is read-only afterwards.

use std::collections::HashMap;

use thiserror::Error;
use wansight_bridge_framework::{BridgeConfig, LogFormat, LoggingConfig, TopicBuilder, ZenohConfig};
use wansight_common::topic::{DEFAULT_BASE_PREFIX, DEFAULT_DISCOVERY_PREFIX, GROUP};
use wansight_common::{Metric, validate_level};

use crate::source::ConfigSource;

/// Default UCI package holding the reporter configuration.
pub const DEFAULT_PACKAGE: &str = "openwrt-reporter";

/// Configuration errors.
///
/// None of these abort startup: they are reported as the reason the
/// built-in default configuration was used instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration source: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration source failed: {0}")]
    Source(String),
    #[error("Invalid value for '{key}': {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("Invalid interface name: {0:?}")]
    InvalidName(String),
    #[error("No enabled interfaces configured")]
    NoInterfaces,
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl ToString) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Monitoring class of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceClass {
    /// Primary uplink: link state, throughput and IPv4.
    Base,
    /// Logical interface with simple online/offline and address state.
    Virtual,
}

/// A monitored interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceConfig {
    /// Logical interface name, the key for every lookup and topic.
    pub name: String,
    /// Human readable label.
    pub label: String,
    pub class: InterfaceClass,
    pub enabled: bool,
    pub monitor_ipv4: bool,
    pub monitor_ipv6: bool,
}

impl InterfaceConfig {
    fn new(
        name: &str,
        label: &str,
        class: InterfaceClass,
        monitor_ipv4: bool,
        monitor_ipv6: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            class,
            enabled: true,
            monitor_ipv4,
            monitor_ipv6,
        }
    }
}

/// Bus connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Zenoh mode: "client", "peer" or "router".
    pub mode: String,
    /// Prefix of every state topic.
    pub base_prefix: String,
    /// Prefix of discovery metadata topics.
    pub discovery_prefix: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 7447,
            username: String::new(),
            password: String::new(),
            mode: "client".to_string(),
            base_prefix: DEFAULT_BASE_PREFIX.to_string(),
            discovery_prefix: DEFAULT_DISCOVERY_PREFIX.to_string(),
        }
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    /// When false the bridge exits right after startup.
    pub enabled: bool,
    pub verbose: bool,
    pub log_format: LogFormat,
    pub bus: BusConfig,
    /// Base interfaces first, then virtual ones, each in declaration order.
    pub interfaces: Vec<InterfaceConfig>,
}

impl ResolvedConfig {
    /// The built-in configuration used whenever the source is unusable.
    pub fn builtin(verbose: bool) -> Self {
        Self {
            enabled: true,
            verbose,
            log_format: LogFormat::Text,
            bus: BusConfig::default(),
            interfaces: vec![
                InterfaceConfig::new("wan", "StarNet", InterfaceClass::Base, true, false),
                InterfaceConfig::new("wanb", "Vodafone LTE", InterfaceClass::Base, true, false),
                InterfaceConfig::new("wan6", "StarNet", InterfaceClass::Virtual, false, true),
            ],
        }
    }

    /// Base-class interfaces.
    pub fn base(&self) -> impl Iterator<Item = &InterfaceConfig> {
        self.interfaces
            .iter()
            .filter(|i| i.class == InterfaceClass::Base)
    }

    /// Virtual-class interfaces.
    pub fn virtuals(&self) -> impl Iterator<Item = &InterfaceConfig> {
        self.interfaces
            .iter()
            .filter(|i| i.class == InterfaceClass::Virtual)
    }

    pub fn interface(&self, name: &str) -> Option<&InterfaceConfig> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    /// Label of `name`, or `name` itself when it is not configured.
    pub fn label_of<'a>(&'a self, name: &'a str) -> &'a str {
        self.interface(name).map_or(name, |i| i.label.as_str())
    }

    pub fn topics(&self) -> TopicBuilder {
        TopicBuilder::new(&self.bus.base_prefix, &self.bus.discovery_prefix)
    }

    /// Availability topics of every interface plus the aggregate group.
    pub fn availability_topics(&self) -> Vec<String> {
        let topics = self.topics();
        self.interfaces
            .iter()
            .map(|i| topics.metric(&i.name, Metric::Availability))
            .chain(std::iter::once(topics.group(Metric::Availability)))
            .collect()
    }
}

impl BridgeConfig for ResolvedConfig {
    fn zenoh(&self) -> ZenohConfig {
        ZenohConfig::tcp(&self.bus.mode, &self.bus.host, self.bus.port)
            .with_credentials(&self.bus.username, &self.bus.password)
    }

    fn logging(&self) -> LoggingConfig {
        LoggingConfig::for_verbosity(self.verbose, self.log_format)
    }
}

/// Settings given on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CliOverrides {
    /// `--verbose`; when set it wins over the configured value.
    pub verbose: bool,
}

/// Outcome of configuration resolution.
#[derive(Debug)]
pub struct Resolution {
    pub config: ResolvedConfig,
    /// Why the built-in default was used, if it was.
    pub fallback: Option<ConfigError>,
}

/// Resolve the configuration, logging the reason for any fallback.
///
/// Never fails: an unreadable or invalid source yields the built-in default.
pub fn resolve(source: &dyn ConfigSource, cli: &CliOverrides) -> ResolvedConfig {
    let resolution = resolve_with_diagnostics(source, cli);
    if let Some(reason) = &resolution.fallback {
        tracing::warn!(
            source = %source.describe(),
            error = %reason,
            "Using built-in default configuration"
        );
    }
    resolution.config
}

/// Resolve the configuration and report why the default was used, if it was.
///
/// Useful when logging is not yet initialised at resolution time.
pub fn resolve_with_diagnostics(source: &dyn ConfigSource, cli: &CliOverrides) -> Resolution {
    let parsed = source.entries().and_then(|entries| {
        let mut draft = Draft::default();
        for (key, value) in &entries {
            draft.apply(key, value)?;
        }
        draft.finish(cli)
    });

    match parsed {
        Ok(config) => Resolution {
            config,
            fallback: None,
        },
        Err(reason) => Resolution {
            config: ResolvedConfig::builtin(cli.verbose),
            fallback: Some(reason),
        },
    }
}

/// An interface while the source is being parsed.
#[derive(Debug)]
struct InterfaceDraft {
    name: String,
    label: Option<String>,
    enabled: bool,
    monitor_ipv4: Option<bool>,
    monitor_ipv6: Option<bool>,
}

impl InterfaceDraft {
    fn finish(self, class: InterfaceClass) -> InterfaceConfig {
        InterfaceConfig {
            label: self.label.unwrap_or_else(|| self.name.to_uppercase()),
            monitor_ipv4: self.monitor_ipv4.unwrap_or(true),
            monitor_ipv6: self
                .monitor_ipv6
                .unwrap_or(class == InterfaceClass::Virtual),
            name: self.name,
            class,
            enabled: self.enabled,
        }
    }
}

/// Accumulated state of a parse.
///
/// The two class lists partition the interface set: an entry lives in
/// exactly one of them.
#[derive(Debug)]
struct Draft {
    enabled: bool,
    verbose: bool,
    log_format: LogFormat,
    bus: BusConfig,
    section_types: HashMap<String, String>,
    base: Vec<InterfaceDraft>,
    virtuals: Vec<InterfaceDraft>,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            enabled: true,
            verbose: false,
            log_format: LogFormat::Text,
            bus: BusConfig::default(),
            section_types: HashMap::new(),
            base: Vec::new(),
            virtuals: Vec::new(),
        }
    }
}

impl Draft {
    /// Apply one `package.section[.attribute]` entry.
    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() < 2 {
            return Ok(());
        }

        let section = parts[1];
        if is_anonymous(section) {
            tracing::trace!(key = %key, "Skipping anonymous section");
            return Ok(());
        }

        if parts.len() == 2 {
            self.section_types
                .insert(section.to_string(), value.to_string());
            if value == "interface" && !is_reserved(section) {
                self.interface_mut(section)?;
            }
            return Ok(());
        }

        let attr = parts[parts.len() - 1];
        match section {
            "global" => self.apply_global(key, attr, value),
            "mqtt" | "bus" => self.apply_bus(key, attr, value),
            _ => match self.section_types.get(section).cloned().as_deref() {
                None | Some("interface") => self.apply_interface(key, section, attr, value),
                Some(other) => {
                    tracing::debug!(section = %section, kind = %other, "Ignoring section");
                    Ok(())
                }
            },
        }
    }

    fn apply_global(&mut self, key: &str, attr: &str, value: &str) -> Result<(), ConfigError> {
        match attr {
            "enabled" => self.enabled = parse_bool(key, value)?,
            "verbose" => self.verbose = parse_bool(key, value)?,
            "log_format" => {
                self.log_format = value
                    .parse()
                    .map_err(|e| ConfigError::invalid(key, value, e))?;
            }
            _ => tracing::debug!(key = %key, "Ignoring unknown global option"),
        }
        Ok(())
    }

    fn apply_bus(&mut self, key: &str, attr: &str, value: &str) -> Result<(), ConfigError> {
        match attr {
            "host" => self.bus.host = value.to_string(),
            "port" => {
                self.bus.port = value
                    .parse()
                    .map_err(|e| ConfigError::invalid(key, value, e))?;
            }
            "username" => self.bus.username = value.to_string(),
            "password" => self.bus.password = value.to_string(),
            "mode" => {
                ZenohConfig::validate_mode(value)
                    .map_err(|e| ConfigError::invalid(key, value, e))?;
                self.bus.mode = value.to_string();
            }
            "base_topic" => self.bus.base_prefix = parse_prefix(key, value)?,
            "discovery_prefix" => self.bus.discovery_prefix = parse_prefix(key, value)?,
            _ => tracing::debug!(key = %key, "Ignoring unknown bus option"),
        }
        Ok(())
    }

    fn apply_interface(
        &mut self,
        key: &str,
        name: &str,
        attr: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        match attr {
            "type" => {
                let class = match value {
                    "base" => InterfaceClass::Base,
                    "virtual" => InterfaceClass::Virtual,
                    _ => return Err(ConfigError::invalid(key, value, "expected base or virtual")),
                };
                self.interface_mut(name)?;
                self.reclassify(name, class);
            }
            "enabled" => self.interface_mut(name)?.enabled = parse_bool(key, value)?,
            "label" => self.interface_mut(name)?.label = Some(value.to_string()),
            "monitor_ipv4" => {
                self.interface_mut(name)?.monitor_ipv4 = Some(parse_bool(key, value)?);
            }
            "monitor_ipv6" => {
                self.interface_mut(name)?.monitor_ipv6 = Some(parse_bool(key, value)?);
            }
            _ => {
                self.interface_mut(name)?;
                tracing::debug!(key = %key, "Ignoring unknown interface option");
            }
        }
        Ok(())
    }

    /// Find the interface `name` in either class list, creating it as Base.
    fn interface_mut(&mut self, name: &str) -> Result<&mut InterfaceDraft, ConfigError> {
        if let Some(pos) = self.base.iter().position(|i| i.name == name) {
            return Ok(&mut self.base[pos]);
        }
        if let Some(pos) = self.virtuals.iter().position(|i| i.name == name) {
            return Ok(&mut self.virtuals[pos]);
        }

        validate_level(name).map_err(|_| ConfigError::InvalidName(name.to_string()))?;
        if name == GROUP {
            return Err(ConfigError::InvalidName(name.to_string()));
        }

        self.base.push(InterfaceDraft {
            name: name.to_string(),
            label: None,
            enabled: true,
            monitor_ipv4: None,
            monitor_ipv6: None,
        });
        let last = self.base.len() - 1;
        Ok(&mut self.base[last])
    }

    /// Move `name` into the list for `class`, if it is not already there.
    fn reclassify(&mut self, name: &str, class: InterfaceClass) {
        let (from, to) = match class {
            InterfaceClass::Base => (&mut self.virtuals, &mut self.base),
            InterfaceClass::Virtual => (&mut self.base, &mut self.virtuals),
        };
        if let Some(pos) = from.iter().position(|i| i.name == name) {
            let entry = from.remove(pos);
            to.push(entry);
        }
    }

    fn finish(self, cli: &CliOverrides) -> Result<ResolvedConfig, ConfigError> {
        let base: Vec<_> = self.base.into_iter().filter(|i| i.enabled).collect();
        let virtuals: Vec<_> = self.virtuals.into_iter().filter(|i| i.enabled).collect();

        if base.is_empty() && virtuals.is_empty() {
            return Err(ConfigError::NoInterfaces);
        }

        let interfaces = base
            .into_iter()
            .map(|i| i.finish(InterfaceClass::Base))
            .chain(virtuals.into_iter().map(|i| i.finish(InterfaceClass::Virtual)))
            .collect();

        Ok(ResolvedConfig {
            enabled: self.enabled,
            verbose: cli.verbose || self.verbose,
            log_format: self.log_format,
            bus: self.bus,
            interfaces,
        })
    }
}

/// Anonymous (`@type[N]`) and numeric sections denote list positions.
fn is_anonymous(section: &str) -> bool {
    section.starts_with('@') || section.chars().all(|c| c.is_ascii_digit())
}

fn is_reserved(section: &str) -> bool {
    matches!(section, "global" | "mqtt" | "bus")
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value, "expected a boolean")),
    }
}

/// A topic prefix: one or more valid levels separated by `/`.
fn parse_prefix(key: &str, value: &str) -> Result<String, ConfigError> {
    for level in value.split('/') {
        validate_level(level).map_err(|e| ConfigError::invalid(key, value, e))?;
    }
    Ok(value.to_string())
}
