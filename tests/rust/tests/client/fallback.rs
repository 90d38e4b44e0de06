//! Fallback routing tests

use capmux_core::ErrorCategory;
use pretty_assertions::assert_eq;
use tests::fixtures::mock_client;

#[tokio::test]
async fn test_failed_send_falls_back_to_healthy_capability() {
    tests::logging::init();
    let client = mock_client(
        r#"{
            "primary": {"endpoint": "https://primary.example.com", "metadata": {"fail_send": true}},
            "backup": "https://backup.example.com"
        }"#,
    );
    assert_eq!(client.connect_all().await.success_count(), 2);

    let reply = client.query("ask primary for data", None).await.unwrap();
    assert_eq!(reply.requested_capability, "primary");
    assert_eq!(reply.capability, "backup");
    assert!(reply.fallback_used);
    assert!(!client.pool().is_healthy("primary"));
    assert_eq!(client.error_counts().get("query"), Some(&1));
}

#[tokio::test]
async fn test_unconnected_target_falls_back() {
    let client = mock_client(
        r#"{
            "primary": {"endpoint": "https://primary.example.com", "metadata": {"fail_connect": true}},
            "backup": "https://backup.example.com"
        }"#,
    );
    client.connect_all().await;

    let reply = client.query("anything", Some("primary")).await.unwrap();
    assert_eq!(reply.capability, "backup");
    assert!(reply.fallback_used);
}

#[tokio::test]
async fn test_no_healthy_server_left() {
    let client = mock_client(
        r#"{
            "a": {"endpoint": "https://a.example.com", "metadata": {"fail_send": true}},
            "b": {"endpoint": "https://b.example.com", "metadata": {"fail_send": true}}
        }"#,
    );
    client.connect_all().await;

    let err = client.query("hello", Some("a")).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Connection);
    assert_eq!(err.message(), "No healthy servers available");
}

#[tokio::test]
async fn test_query_before_connect_fails() {
    let client = mock_client(r#"{"docs": "https://mcp.example.com"}"#);

    let err = client.query("docs please", None).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Connection);
}
