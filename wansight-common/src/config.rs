use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Zenoh connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZenohConfig {
    /// Zenoh mode: "client", "peer", or "router".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Endpoints to connect to (for client mode).
    #[serde(default)]
    pub connect: Vec<String>,

    /// Endpoints to listen on (for peer/router mode).
    #[serde(default)]
    pub listen: Vec<String>,

    /// Optional user/password credentials for the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

/// User/password pair handed to the Zenoh transport.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn default_mode() -> String {
    "client".to_string()
}

impl Default for ZenohConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            connect: Vec::new(),
            listen: Vec::new(),
            credentials: None,
        }
    }
}

impl ZenohConfig {
    /// Configuration connecting to a single TCP endpoint.
    pub fn tcp(mode: impl Into<String>, host: &str, port: u16) -> Self {
        Self {
            mode: mode.into(),
            connect: vec![format!("tcp/{}:{}", host, port)],
            ..Self::default()
        }
    }

    /// Attach credentials. An empty username leaves the session anonymous.
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = if username.is_empty() {
            None
        } else {
            Some(Credentials {
                username: username.to_string(),
                password: password.to_string(),
            })
        };
        self
    }

    /// Check that `mode` is one Zenoh understands.
    pub fn validate_mode(mode: &str) -> Result<()> {
        match mode {
            "client" | "peer" | "router" => Ok(()),
            other => Err(Error::Config(format!(
                "Invalid Zenoh mode: '{}'. Expected 'client', 'peer', or 'router'",
                other
            ))),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(Error::Config(format!(
                "Invalid log format: '{}'. Expected 'text' or 'json'",
                other
            ))),
        }
    }
}

/// Common logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Logging at `debug` when verbose, `info` otherwise.
    pub fn for_verbosity(verbose: bool, format: LogFormat) -> Self {
        Self {
            level: if verbose { "debug" } else { "info" }.to_string(),
            format,
        }
    }
}
