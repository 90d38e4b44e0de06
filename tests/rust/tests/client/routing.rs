//! Query routing tests

use capmux_core::ErrorCategory;
use pretty_assertions::assert_eq;
use tests::fixtures::{mock_client, servers_source};

#[tokio::test]
async fn test_query_routes_by_capability_name() {
    let client = mock_client(&servers_source(&[("docs", "https://mcp.example.com/sse")]));
    client.connect_all().await;

    assert_eq!(client.detect_capability("search docs for X"), Some("docs"));
    let reply = client.query("search docs for X", None).await.unwrap();
    assert_eq!(reply.capability, "docs");
    assert_eq!(reply.requested_capability, "docs");
    assert!(!reply.fallback_used);
}

#[tokio::test]
async fn test_query_routes_by_domain_keywords() {
    let client = mock_client(&servers_source(&[
        ("atlassian", "https://atlassian.example.com/mcp"),
        ("github", "https://github.example.com/mcp"),
    ]));
    assert_eq!(client.connect_all().await.success_count(), 2);

    let issues = client.query("list open issues", None).await.unwrap();
    assert_eq!(issues.capability, "atlassian");

    let commits = client.query("show recent commits", None).await.unwrap();
    assert_eq!(commits.capability, "github");
}

#[tokio::test]
async fn test_explicit_capability_skips_detection() {
    let client = mock_client(&servers_source(&[
        ("atlassian", "https://atlassian.example.com/mcp"),
        ("github", "https://github.example.com/mcp"),
    ]));
    client.connect_all().await;

    let reply = client
        .query("list open issues", Some("github"))
        .await
        .unwrap();
    assert_eq!(reply.capability, "github");
    assert_eq!(reply.response["result"]["echo"]["params"]["capability"], "github");
}

#[tokio::test]
async fn test_unknown_capability_is_validation_error() {
    let client = mock_client(&servers_source(&[("docs", "https://mcp.example.com/sse")]));
    client.connect_all().await;

    let err = client.query("hello", Some("weather")).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(err.context().capability.as_deref(), Some("weather"));
}

#[tokio::test]
async fn test_each_query_gets_its_own_message_id() {
    let client = mock_client(&servers_source(&[("docs", "https://mcp.example.com/sse")]));
    client.connect_all().await;

    let first = client.query("docs one", None).await.unwrap();
    let second = client.query("docs two", None).await.unwrap();
    assert_ne!(first.message_id, second.message_id);
    assert_eq!(first.response["id"], first.message_id.as_str());
}
