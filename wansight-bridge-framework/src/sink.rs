//! Publication sinks.
//!
//! A [`Sink`] is the only way bridge code talks to the bus. The production
//! implementation is [`ZenohSink`](crate::ZenohSink); [`LogSink`] backs
//! `--dry-run` and [`MemorySink`] records everything for inspection.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::{BridgeError, Result};

/// Destination for published state.
///
/// Implementations must be safe to share between the pollers; each call is
/// one complete publish.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Publish `payload` to `topic`. Retained messages are replayed to
    /// subscribers that join later.
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> Result<()>;
}

/// Sink that only logs what would have been published.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl Sink for LogSink {
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> Result<()> {
        tracing::info!(topic = %topic, retain, "{}", payload);
        Ok(())
    }
}

/// A single recorded publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// In-memory sink recording every publication in order.
///
/// Topics registered with [`fail_on`](Self::fail_on) reject publishes, which
/// lets callers exercise their error paths.
#[derive(Debug, Default)]
pub struct MemorySink {
    publications: Mutex<Vec<Publication>>,
    failing: Mutex<HashSet<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish to `topic` fail.
    pub fn fail_on(&self, topic: impl Into<String>) {
        lock(&self.failing).insert(topic.into());
    }

    /// All publications so far.
    pub fn publications(&self) -> Vec<Publication> {
        lock(&self.publications).clone()
    }

    /// Payloads published to `topic`, oldest first.
    pub fn payloads(&self, topic: &str) -> Vec<String> {
        lock(&self.publications)
            .iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload.clone())
            .collect()
    }

    /// Most recent publication to `topic`.
    pub fn last(&self, topic: &str) -> Option<Publication> {
        lock(&self.publications)
            .iter()
            .rev()
            .find(|p| p.topic == topic)
            .cloned()
    }

    /// Number of publications whose topic starts with `prefix`.
    pub fn count_with_prefix(&self, prefix: &str) -> usize {
        lock(&self.publications)
            .iter()
            .filter(|p| p.topic.starts_with(prefix))
            .count()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        lock(&self.publications).clear();
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> Result<()> {
        if lock(&self.failing).contains(topic) {
            return Err(BridgeError::publish(topic, "rejected by sink"));
        }

        lock(&self.publications).push(Publication {
            topic: topic.to_string(),
            payload,
            retain,
        });
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
