//! End-to-end tests for session opening and topic layout over Zenoh.
//!
//! Note: Zenoh requires multi-thread tokio runtime.
//! Each test uses a unique base prefix to avoid interference.

use std::time::Duration;
use wansight_common::{Metric, TopicBuilder, ZenohConfig, connect};

/// Generate a unique test prefix to avoid test interference.
fn unique_prefix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test_{}", nanos)
}

fn peer_config() -> ZenohConfig {
    ZenohConfig {
        mode: "peer".to_string(),
        ..ZenohConfig::default()
    }
}

/// A session opened through `connect` delivers plain-text state payloads.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connect_and_publish_state() {
    let topics = TopicBuilder::new(unique_prefix(), "homeassistant");

    let session = connect(&peer_config())
        .await
        .expect("Failed to open Zenoh session");

    let subscriber = session
        .declare_subscriber(format!("{}/**", topics.base()))
        .await
        .expect("Failed to create subscriber");

    tokio::time::sleep(Duration::from_millis(100)).await;

    let key = topics.metric("wan", Metric::LinkStatus);
    session.put(&key, "up").await.expect("Failed to publish");

    let received = tokio::time::timeout(Duration::from_secs(5), subscriber.recv_async())
        .await
        .expect("Timeout waiting for message")
        .expect("Failed to receive message");

    assert_eq!(received.key_expr().as_str(), key);
    let payload = received.payload().try_to_string().expect("utf-8 payload");
    assert_eq!(payload, "up");

    drop(subscriber);
    session.close().await.expect("Failed to close session");
}

/// An invalid mode is rejected before any network activity.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_connect_rejects_invalid_mode() {
    let config = ZenohConfig {
        mode: "broker".to_string(),
        ..ZenohConfig::default()
    };

    assert!(connect(&config).await.is_err());
}
