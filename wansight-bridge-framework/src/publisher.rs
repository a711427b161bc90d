//! Zenoh-backed publication sink.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{BridgeError, Result};
use crate::retained::{RetainedConfig, RetainedPublishers};
use crate::sink::Sink;

/// Sink publishing plain-text payloads to Zenoh.
///
/// Non-retained messages are a single `put` on the session. Retained messages
/// go through [`RetainedPublishers`] so late joiners can recover them.
#[derive(Debug)]
pub struct ZenohSink {
    session: Arc<zenoh::Session>,
    retained: RetainedPublishers,
}

impl ZenohSink {
    pub fn new(session: Arc<zenoh::Session>) -> Self {
        Self::with_retained_config(session, RetainedConfig::default())
    }

    pub fn with_retained_config(session: Arc<zenoh::Session>, config: RetainedConfig) -> Self {
        let retained = RetainedPublishers::new(session.clone(), config);
        Self { session, retained }
    }

    /// Get a reference to the Zenoh session.
    pub fn session(&self) -> &Arc<zenoh::Session> {
        &self.session
    }

    /// Drop every retained publisher, e.g. before closing the session.
    pub async fn release(&self) {
        self.retained.clear().await;
    }
}

#[async_trait]
impl Sink for ZenohSink {
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> Result<()> {
        if retain {
            return self.retained.put(topic, payload).await;
        }

        self.session
            .put(topic, payload)
            .await
            .map_err(|e| BridgeError::publish(topic, e))
    }
}
