//! End-to-end tests for the Zenoh sink.
//!
//! Note: Zenoh requires multi-thread tokio runtime.
//! Each test uses a unique topic prefix to avoid interference.

use std::sync::Arc;
use std::time::Duration;

use wansight_bridge_framework::{Availability, Reporter, Sink, ZenohSink};
use wansight_common::{ZenohConfig, connect};

/// Generate a unique test prefix to avoid test interference.
fn unique_prefix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test_{}", nanos)
}

async fn open_peer() -> zenoh::Session {
    let config = ZenohConfig {
        mode: "peer".to_string(),
        ..ZenohConfig::default()
    };
    connect(&config).await.expect("Failed to open Zenoh session")
}

/// Plain state messages arrive as their text payload.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_plain_publish_roundtrip() {
    let prefix = unique_prefix();
    let session = Arc::new(open_peer().await);

    let subscriber = session
        .declare_subscriber(format!("{}/**", prefix))
        .await
        .expect("Failed to create subscriber");

    tokio::time::sleep(Duration::from_millis(100)).await;

    let sink = ZenohSink::new(session.clone());
    let topic = format!("{}/wan/rx_rate", prefix);
    sink.publish(&topic, "100".to_string(), false)
        .await
        .expect("Failed to publish");

    let received = tokio::time::timeout(Duration::from_secs(5), subscriber.recv_async())
        .await
        .expect("Timeout waiting for message")
        .expect("Failed to receive message");

    assert_eq!(received.key_expr().as_str(), topic);
    assert_eq!(received.payload().try_to_string().unwrap(), "100");

    drop(subscriber);
    session.close().await.expect("Failed to close session");
}

/// Retained availability messages reach live subscribers too.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retained_availability_delivered() {
    let prefix = unique_prefix();
    let session = Arc::new(open_peer().await);

    let subscriber = session
        .declare_subscriber(format!("{}/**", prefix))
        .await
        .expect("Failed to create subscriber");

    tokio::time::sleep(Duration::from_millis(100)).await;

    let sink = Arc::new(ZenohSink::new(session.clone()));
    let topic = format!("{}/mwan3/availability", prefix);
    let availability = Availability::new(Reporter::new(sink.clone()), vec![topic.clone()]);

    let stats = availability.announce_online().await;
    assert_eq!(stats.success, 1);

    let received = tokio::time::timeout(Duration::from_secs(5), subscriber.recv_async())
        .await
        .expect("Timeout waiting for message")
        .expect("Failed to receive message");

    assert_eq!(received.key_expr().as_str(), topic);
    assert_eq!(received.payload().try_to_string().unwrap(), "online");

    drop(subscriber);
    sink.release().await;
    session.close().await.expect("Failed to close session");
}

/// Retained publishes through a session opened by `connect` succeed and the
/// latest value wins.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retained_publish_through_connect() {
    let prefix = unique_prefix();
    let session = Arc::new(open_peer().await);

    let subscriber = session
        .declare_subscriber(format!("{}/**", prefix))
        .await
        .expect("Failed to create subscriber");

    tokio::time::sleep(Duration::from_millis(100)).await;

    let sink = ZenohSink::new(session.clone());
    let topic = format!("{}/wan/availability", prefix);
    sink.publish(&topic, "online".to_string(), true)
        .await
        .expect("Retained publish failed");
    sink.publish(&topic, "offline".to_string(), true)
        .await
        .expect("Retained publish failed");

    let mut payloads = Vec::new();
    for _ in 0..2 {
        let received = tokio::time::timeout(Duration::from_secs(5), subscriber.recv_async())
            .await
            .expect("Timeout waiting for message")
            .expect("Failed to receive message");
        assert_eq!(received.key_expr().as_str(), topic);
        payloads.push(received.payload().try_to_string().unwrap().into_owned());
    }
    assert_eq!(payloads, ["online", "offline"]);

    drop(subscriber);
    sink.release().await;
    session.close().await.expect("Failed to close session");
}
