//! Availability announcements.

use std::fmt;

use crate::reporter::{PublishStats, Reporter};

/// Presence state published on availability topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityState {
    Online,
    Offline,
}

impl AvailabilityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityState::Online => "online",
            AvailabilityState::Offline => "offline",
        }
    }
}

impl fmt::Display for AvailabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishes a retained presence state to a fixed set of availability topics.
///
/// The set is decided once at startup; workers announce `online` before their
/// first tick and the runner announces `offline` on shutdown.
#[derive(Debug, Clone)]
pub struct Availability {
    reporter: Reporter,
    topics: Vec<String>,
}

impl Availability {
    pub fn new(reporter: Reporter, topics: Vec<String>) -> Self {
        Self { reporter, topics }
    }

    /// Publish `state`, retained, to every topic.
    pub async fn announce(&self, state: AvailabilityState) -> PublishStats {
        let mut stats = PublishStats::default();
        for topic in &self.topics {
            stats.record(self.reporter.publish(topic, state, true).await);
        }
        tracing::debug!(
            state = %state,
            published = stats.success,
            failed = stats.failed,
            "Announced availability"
        );
        stats
    }

    pub async fn announce_online(&self) -> PublishStats {
        self.announce(AvailabilityState::Online).await
    }

    pub async fn announce_offline(&self) -> PublishStats {
        self.announce(AvailabilityState::Offline).await
    }
}
