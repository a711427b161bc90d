//! Retained publications on top of zenoh-ext advanced publishers.
//!
//! Zenoh has no broker-side retained flag. A retained topic is instead served
//! by an [`AdvancedPublisher`] that keeps the last samples in a cache, so
//! subscribers that ask for history when they join still see the value.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use zenoh::Session;
use zenoh::key_expr::KeyExpr;
use zenoh_ext::{AdvancedPublisher, AdvancedPublisherBuilderExt, CacheConfig};

use crate::error::{BridgeError, Result};

/// Configuration for retained publishers.
#[derive(Debug, Clone)]
pub struct RetainedConfig {
    /// Number of samples cached per topic.
    /// Default: 1
    pub cache_size: usize,

    /// Enable publisher detection (subscribers can see the publisher come and go).
    /// Default: true
    pub publisher_detection: bool,
}

impl Default for RetainedConfig {
    fn default() -> Self {
        Self {
            cache_size: 1,
            publisher_detection: true,
        }
    }
}

/// Registry of cached publishers, one per retained topic.
///
/// Publishers are declared lazily on the first retained publish to a topic
/// and live as long as the registry.
pub struct RetainedPublishers {
    session: Arc<Session>,
    config: RetainedConfig,
    publishers: RwLock<HashMap<String, AdvancedPublisher<'static>>>,
}

impl std::fmt::Debug for RetainedPublishers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetainedPublishers")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RetainedPublishers {
    pub fn new(session: Arc<Session>, config: RetainedConfig) -> Self {
        Self {
            session,
            config,
            publishers: RwLock::new(HashMap::new()),
        }
    }

    /// Declare the publisher for `topic` unless it already exists.
    async fn ensure_publisher(&self, topic: &str) -> Result<()> {
        {
            let publishers = self.publishers.read().await;
            if publishers.contains_key(topic) {
                return Ok(());
            }
        }

        let key_expr = KeyExpr::try_from(topic.to_string())
            .map_err(|e| BridgeError::publish(topic, e))?;

        let builder = self
            .session
            .declare_publisher(key_expr)
            .cache(CacheConfig::default().max_samples(self.config.cache_size));

        let publisher: AdvancedPublisher<'static> = if self.config.publisher_detection {
            builder.publisher_detection().await
        } else {
            builder.await
        }
        .map_err(|e| {
            BridgeError::publish(topic, format!("Failed to create retained publisher: {}", e))
        })?;

        let mut publishers = self.publishers.write().await;
        publishers.entry(topic.to_string()).or_insert(publisher);

        tracing::debug!(topic = %topic, cache_size = self.config.cache_size, "Declared retained publisher");

        Ok(())
    }

    /// Publish `payload` through the cached publisher for `topic`.
    pub async fn put(&self, topic: &str, payload: String) -> Result<()> {
        self.ensure_publisher(topic).await?;

        let publishers = self.publishers.read().await;
        if let Some(publisher) = publishers.get(topic) {
            publisher
                .put(payload)
                .await
                .map_err(|e| BridgeError::publish(topic, e))?;
        }

        Ok(())
    }

    /// Undeclare every publisher.
    pub async fn clear(&self) {
        let mut publishers = self.publishers.write().await;
        publishers.clear();
        tracing::debug!("Cleared retained publishers");
    }
}
