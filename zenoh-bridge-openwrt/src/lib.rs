//! Zenoh bridge for OpenWrt uplink health.
//!
//! This bridge polls interface link state, byte counters, addresses and
//! mwan3 failover status on an OpenWrt router and publishes derived state
//! to Zenoh, along with Home Assistant discovery metadata.
//!
//! # Key Expressions
//!
//! ```text
//! openwrt/<interface>/availability     online | offline (retained)
//! openwrt/<interface>/status           online | offline | unknown
//! openwrt/<interface>/link_status      kernel operstate (base only)
//! openwrt/<interface>/rx_bytes         cumulative bytes (base only)
//! openwrt/<interface>/rx_rate          bytes per second (base only)
//! openwrt/<interface>/ipv4             address | unavailable
//! openwrt/mwan3/active                 active uplink name
//! openwrt/mwan3/active_name            active uplink label
//! homeassistant/<component>/openwrt_<interface>_<metric>/config
//! ```

pub mod accessor;
pub mod config;
pub mod discovery;
pub mod fast;
pub mod openwrt;
pub mod rates;
pub mod slow;
pub mod source;
