//! EndpointValidator tests

use capmux_core::{EndpointType, EndpointValidator};
use pretty_assertions::assert_eq;
use std::collections::HashMap;

#[test]
fn test_mixed_endpoint_kinds() {
    let results = EndpointValidator::validate_configuration([
        ("docs", "https://mcp.example.com/sse"),
        ("jira", "jira-mcp.tools.svc.cluster.local:8080"),
        ("bad", "ftp://files.example.com"),
    ]);

    assert_eq!(results["docs"].endpoint_type, EndpointType::ExternalRoute);
    assert_eq!(results["jira"].endpoint_type, EndpointType::ClusterService);
    assert_eq!(results["bad"].endpoint_type, EndpointType::None);
    assert!(!results["bad"].valid);
}

#[test]
fn test_cluster_service_parsed_info() {
    let result = EndpointValidator::validate("jira-mcp.tools.svc.cluster.local:8080");

    let info = result.parsed_info();
    assert_eq!(info.get("service").map(String::as_str), Some("jira-mcp"));
    assert_eq!(info.get("namespace").map(String::as_str), Some("tools"));
    assert_eq!(info.get("port").map(String::as_str), Some("8080"));
}

#[test]
fn test_rejections_carry_a_reason() {
    for endpoint in [
        "",
        "https://",
        "https://mcp.example.com:70000",
        "https://mcp.example.com/a b",
        "jira.tools.svc",
        "Jira.tools.svc.cluster.local",
        "just-a-host",
    ] {
        let result = EndpointValidator::validate(endpoint);
        assert!(!result.valid, "{:?} should be rejected", endpoint);
        assert!(
            result.error_message.as_deref().is_some_and(|m| !m.is_empty()),
            "{:?} should explain the rejection",
            endpoint
        );
        assert!(result.parsed_info().is_empty());
    }
}

#[test]
fn test_port_bounds() {
    assert!(EndpointValidator::validate("https://mcp.example.com:1").valid);
    assert!(EndpointValidator::validate("https://mcp.example.com:65535").valid);

    let result = EndpointValidator::validate("https://mcp.example.com:0");
    assert!(result
        .error_message
        .unwrap()
        .contains("between 1 and 65535"));
}

#[test]
fn test_configuration_map() {
    let mut servers = HashMap::new();
    servers.insert("docs".to_string(), "https://mcp.example.com".to_string());
    servers.insert("bad".to_string(), "nope".to_string());

    let validation = EndpointValidator::validate_configuration_map(&servers);
    assert!(!validation.valid);
    assert_eq!(validation.errors.len(), 1);
    assert!(validation.errors[0].starts_with("bad:"));
    assert_eq!(validation.results.len(), 2);

    let empty = EndpointValidator::validate_configuration_map(&HashMap::new());
    assert!(!empty.valid);
}
