//! Throughput derivation from cumulative byte counters.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::accessor::Reading;

/// Last complete counter sample of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleState {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub at: Instant,
}

/// Values to publish for one interface in one tick.
///
/// A `None` field is not published.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Derived {
    pub rx_bytes: Option<u64>,
    pub tx_bytes: Option<u64>,
    /// Bytes per second, rounded.
    pub rx_rate: Option<u64>,
    pub tx_rate: Option<u64>,
}

/// Per-interface prior samples.
///
/// An interface without an entry has no prior sample. Entries are only
/// replaced when both counters were read successfully.
#[derive(Debug, Default)]
pub struct RateTracker {
    samples: Mutex<HashMap<String, SampleState>>,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current counters of `interface` observed at `now`.
    pub async fn observe(
        &self,
        interface: &str,
        rx: Reading<u64>,
        tx: Reading<u64>,
        now: Instant,
    ) -> Derived {
        let mut derived = Derived {
            rx_bytes: rx.clone().ok(),
            tx_bytes: tx.clone().ok(),
            ..Derived::default()
        };

        let (Reading::Available(rx), Reading::Available(tx)) = (rx, tx) else {
            tracing::debug!(interface = %interface, "Incomplete counters, keeping prior sample");
            return derived;
        };

        let mut samples = self.samples.lock().await;
        if let Some(prior) = samples.get(interface) {
            let elapsed = now.saturating_duration_since(prior.at).as_secs_f64();
            if elapsed > 0.0 {
                derived.rx_rate = rate(rx, prior.rx_bytes, elapsed);
                derived.tx_rate = rate(tx, prior.tx_bytes, elapsed);
                if derived.rx_rate.is_none() || derived.tx_rate.is_none() {
                    tracing::debug!(interface = %interface, "Counter went backwards, rate skipped");
                }
            }
        }

        samples.insert(
            interface.to_string(),
            SampleState {
                rx_bytes: rx,
                tx_bytes: tx,
                at: now,
            },
        );

        derived
    }

    /// Prior sample of `interface`, if any.
    pub async fn prior(&self, interface: &str) -> Option<SampleState> {
        self.samples.lock().await.get(interface).copied()
    }
}

/// Rate rounded half to even, or `None` when the counter decreased.
fn rate(current: u64, prior: u64, elapsed_secs: f64) -> Option<u64> {
    let delta = current.checked_sub(prior)?;
    Some((delta as f64 / elapsed_secs).round_ties_even() as u64)
}
