//! Device accessor backed by OpenWrt tools and sysfs.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::accessor::{
    AddressFamily, DeviceAccessor, Direction, MwanSnapshot, OperState, Reading, parse_active_uplink,
    parse_ip_address, parse_l3_device, parse_mwan_status,
};

/// Default location of network devices in sysfs.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/net";

/// Default bound on a single external command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Reads interface state through `ubus`, `mwan3` and sysfs.
///
/// Commands are spawned directly (no shell) and killed when they exceed
/// the configured timeout.
#[derive(Debug, Clone)]
pub struct OpenWrtAccessor {
    sysfs_root: PathBuf,
    command_timeout: Duration,
}

impl Default for OpenWrtAccessor {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT, DEFAULT_COMMAND_TIMEOUT)
    }
}

impl OpenWrtAccessor {
    pub fn new(sysfs_root: impl AsRef<Path>, command_timeout: Duration) -> Self {
        Self {
            sysfs_root: sysfs_root.as_ref().to_path_buf(),
            command_timeout,
        }
    }

    /// Run a command and return its stdout.
    async fn run(&self, program: &str, args: &[&str]) -> Reading<String> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(program = %program, error = %e, "Failed to spawn command");
                return Reading::Unavailable;
            }
        };

        match tokio::time::timeout(self.command_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => {
                Reading::Available(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(Ok(output)) => {
                tracing::debug!(
                    program = %program,
                    args = ?args,
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "Command failed"
                );
                Reading::Unavailable
            }
            Ok(Err(e)) => {
                tracing::debug!(program = %program, error = %e, "Command I/O error");
                Reading::Unavailable
            }
            Err(_) => {
                tracing::warn!(
                    program = %program,
                    args = ?args,
                    timeout_secs = self.command_timeout.as_secs(),
                    "Command timed out"
                );
                Reading::Unavailable
            }
        }
    }

    /// `ubus call network.interface.<name> status` as JSON.
    async fn interface_status(&self, interface: &str) -> Option<Value> {
        let object = format!("network.interface.{interface}");
        let output = self.run("ubus", &["call", object.as_str(), "status"]).await.ok()?;

        match serde_json::from_str(&output) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(interface = %interface, error = %e, "Malformed ubus status");
                None
            }
        }
    }

    /// Path of a sysfs attribute of `device`, refusing names that escape the root.
    fn device_path(&self, device: &str, attribute: &str) -> Option<PathBuf> {
        if device.is_empty() || device.contains('/') || device == "." || device == ".." {
            tracing::debug!(device = %device, "Refusing unusual device name");
            return None;
        }
        Some(self.sysfs_root.join(device).join(attribute))
    }

    async fn read_attribute(&self, device: &str, attribute: &str) -> Option<String> {
        let path = self.device_path(device, attribute)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Failed to read sysfs attribute");
                None
            }
        }
    }
}

#[async_trait]
impl DeviceAccessor for OpenWrtAccessor {
    async fn device_of(&self, interface: &str) -> Option<String> {
        let status = self.interface_status(interface).await?;
        parse_l3_device(&status)
    }

    async fn oper_state(&self, device: &str) -> Reading<OperState> {
        self.read_attribute(device, "operstate")
            .await
            .and_then(|raw| OperState::parse(&raw))
            .into()
    }

    async fn byte_counter(&self, device: &str, direction: Direction) -> Reading<u64> {
        let attribute = format!("statistics/{}_bytes", direction.as_str());
        self.read_attribute(device, &attribute)
            .await
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .into()
    }

    async fn mwan_status(&self) -> MwanSnapshot {
        match self.run("mwan3", &["status"]).await {
            Reading::Available(output) => parse_mwan_status(&output),
            Reading::Unavailable => MwanSnapshot::default(),
        }
    }

    async fn active_uplink(&self) -> Option<String> {
        let output = self.run("mwan3", &["status"]).await.ok()?;
        parse_active_uplink(&output)
    }

    async fn ip_address(&self, interface: &str, family: AddressFamily) -> Reading<String> {
        match self.interface_status(interface).await {
            Some(status) => parse_ip_address(&status, family),
            None => Reading::Unavailable,
        }
    }
}
