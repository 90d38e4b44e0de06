//! Pool health and bookkeeping tests

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use capmux_core::{ConnectionType, ErrorCategory};
use capmux_mcp::{Connection, ConnectionPool, MockConnection};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_unhealthy_capability_recovers_after_health_check() {
    let pool = ConnectionPool::new(4);
    let mock = MockConnection::new("https://flaky.example.com", Duration::from_secs(1));
    let switch = mock.failure_switch();
    assert!(pool.insert_connection("flaky", Connection::Mock(mock)).await);

    switch.store(true, Ordering::SeqCst);
    let err = pool.send_message("flaky", json!({"method": "x"})).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Connection);
    assert!(!pool.is_healthy("flaky"));

    // unhealthy entries refuse sends without touching the connection
    let err = pool.send_message("flaky", json!({})).await.unwrap_err();
    assert!(err.message().contains("marked unhealthy"));

    switch.store(false, Ordering::SeqCst);
    let health = pool.health_check().await;
    assert_eq!(health.get("flaky"), Some(&true));
    assert!(pool.send_message("flaky", json!({})).await.is_ok());
}

#[tokio::test]
async fn test_health_keys_are_pooled_capabilities() {
    let pool = ConnectionPool::new(4);
    assert!(pool.add_connection("a", "https://a.example.com", None, true).await);
    assert!(pool.add_connection("b", "https://b.example.com", None, true).await);
    assert!(
        !pool
            .insert_connection(
                "broken",
                Connection::Mock(
                    MockConnection::new("https://x.example.com", Duration::from_secs(1))
                        .with_connect_failure(),
                ),
            )
            .await
    );

    let mut keys: Vec<String> = pool.health_check().await.into_keys().collect();
    keys.sort();
    assert_eq!(keys, vec!["a", "b"]);
    assert_eq!(pool.get_health_status().len(), 2);
    assert!(pool.last_error("broken").is_some());
}

#[tokio::test]
async fn test_connection_info_snapshot() {
    let pool = ConnectionPool::default();
    assert!(pool.add_connection("docs", "https://docs.example.com", None, true).await);

    let info = pool.get_connection_info().await;
    let docs = &info["docs"];
    assert_eq!(docs.endpoint, "https://docs.example.com");
    assert_eq!(docs.connection_type, ConnectionType::Mock);
    assert!(docs.connected);
    assert!(docs.healthy);
}

#[tokio::test]
async fn test_send_to_unknown_capability() {
    let pool = ConnectionPool::default();
    let err = pool.send_message("ghost", json!({})).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Connection);
    assert_eq!(err.context().capability.as_deref(), Some("ghost"));
}

#[tokio::test]
async fn test_close_all_then_reconnect() {
    let pool = ConnectionPool::new(1);
    assert!(pool.add_connection("a", "https://a.example.com", None, true).await);
    assert!(!pool.add_connection("b", "https://b.example.com", None, true).await);

    pool.close_all().await;
    assert!(pool.is_empty());
    assert!(pool.add_connection("b", "https://b.example.com", None, true).await);
}

#[tokio::test(start_paused = true)]
async fn test_close_all_aborts_inflight_work() {
    let pool = Arc::new(ConnectionPool::new(4));
    let slow = MockConnection::new("https://slow.example.com", Duration::from_secs(30))
        .with_latency(Duration::from_secs(3));
    assert!(pool.insert_connection("slow", Connection::Mock(slow)).await);

    let sender = Arc::clone(&pool);
    let send = tokio::spawn(async move { sender.send_message("slow", json!({"method": "x"})).await });
    let checker = Arc::clone(&pool);
    let check = tokio::spawn(async move { checker.health_check().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = tokio::time::Instant::now();
    pool.close_all().await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(pool.is_empty());

    let err = send.await.unwrap().unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Connection);
    assert_eq!(err.context().capability.as_deref(), Some("slow"));

    let health = check.await.unwrap();
    assert_eq!(health.get("slow"), Some(&false));
}
