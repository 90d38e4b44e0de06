//! External route tests against a wiremock server

use std::time::Duration;

use capmux_core::{ConnectionType, ErrorCategory, ServerConfig};
use capmux_mcp::{ConnectionFactory, ConnectionPool, McpConnection};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn server_with(status: u16, body: Value) -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&mock_server)
        .await;
    mock_server
}

#[tokio::test]
async fn test_posts_payload_and_decodes_reply() {
    tests::logging::init();
    let mock_server = server_with(200, json!({"jsonrpc": "2.0", "result": {"ok": true}})).await;
    let endpoint = format!("{}/mcp", mock_server.uri());

    let mut conn = ConnectionFactory::create(&endpoint, None, Duration::from_secs(5)).unwrap();
    assert_eq!(conn.connection_type(), ConnectionType::ExternalRoute);
    conn.connect().await.unwrap();

    let reply = conn
        .send_message(json!({"jsonrpc": "2.0", "method": "query"}))
        .await
        .unwrap();
    assert_eq!(reply["result"]["ok"], true);

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let sent: Value = requests[0].body_json().unwrap();
    assert_eq!(sent["method"], "query");
    assert!(sent["id"].is_string());

    conn.close().await.unwrap();
    assert!(!conn.is_connected());
}

#[tokio::test]
async fn test_status_codes_map_to_categories() {
    for (status, expected) in [
        (401, ErrorCategory::Authentication),
        (403, ErrorCategory::Authentication),
        (404, ErrorCategory::Protocol),
        (500, ErrorCategory::Protocol),
    ] {
        let mock_server = server_with(status, json!({"error": "nope"})).await;
        let pool = ConnectionPool::default();
        let endpoint = format!("{}/mcp", mock_server.uri());
        assert!(pool.add_connection("remote", &endpoint, None, false).await);

        let err = pool.send_message("remote", json!({})).await.unwrap_err();
        assert_eq!(err.category(), expected, "HTTP {}", status);
        assert!(!pool.is_healthy("remote"));
    }
}

#[tokio::test]
async fn test_undecodable_body_is_protocol_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&mock_server)
        .await;

    let pool = ConnectionPool::default();
    assert!(pool.add_connection("remote", &mock_server.uri(), None, false).await);

    let err = pool.send_message("remote", json!({})).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Protocol);
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": {}}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let pool = ConnectionPool::default();
    let server = ServerConfig::new("slow", mock_server.uri(), 1);
    assert!(pool.add_server(&server, false).await);

    let err = pool.send_message("slow", json!({})).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Timeout);
}

#[tokio::test]
async fn test_unreachable_server_is_connection_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let pool = ConnectionPool::default();
    assert!(pool.add_connection("gone", &endpoint, None, false).await);

    let err = pool.send_message("gone", json!({})).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Connection);
}
