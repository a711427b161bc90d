//! Fire-and-forget publishing on top of a [`Sink`].

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::sink::Sink;

/// Shared handle used by workers to publish state.
///
/// Publish failures are logged and counted, never returned: the next tick
/// supersedes whatever was lost.
#[derive(Clone)]
pub struct Reporter {
    sink: Arc<dyn Sink>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter").finish_non_exhaustive()
    }
}

impl Reporter {
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self { sink }
    }

    /// Publish a value rendered with `Display`.
    ///
    /// Returns `true` when the sink accepted the message.
    pub async fn publish(&self, topic: &str, payload: impl fmt::Display, retain: bool) -> bool {
        match self.sink.publish(topic, payload.to_string(), retain).await {
            Ok(()) => {
                tracing::trace!(topic = %topic, retain, "Published");
                true
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Failed to publish");
                false
            }
        }
    }

    /// Publish a JSON-encoded value.
    pub async fn publish_json<T: Serialize>(&self, topic: &str, value: &T, retain: bool) -> bool {
        match serde_json::to_string(value) {
            Ok(payload) => self.publish(topic, payload, retain).await,
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Failed to encode payload");
                false
            }
        }
    }
}

/// Statistics from a batch of publishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Number of successfully published messages.
    pub success: usize,
    /// Number of failed publishes.
    pub failed: usize,
}

impl PublishStats {
    /// Record the outcome of one publish.
    pub fn record(&mut self, ok: bool) {
        if ok {
            self.success += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Fold another batch into this one.
    pub fn merge(&mut self, other: PublishStats) {
        self.success += other.success;
        self.failed += other.failed;
    }

    /// Total number of attempted publishes.
    pub fn total(&self) -> usize {
        self.success + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            100.0
        } else {
            (self.success as f64 / self.total() as f64) * 100.0
        }
    }
}
