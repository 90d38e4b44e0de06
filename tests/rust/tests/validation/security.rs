//! SecurityValidator tests

use capmux_core::validation::security::{MAX_CONFIG_SIZE, MAX_ENDPOINTS};
use capmux_core::{
    ConfigManager, ConfigOptions, Configuration, ErrorCategory, SecurityReport, SecurityValidator,
};
use pretty_assertions::assert_eq;
use tests::fixtures::servers_source;

fn unchecked(source: &str) -> Configuration {
    ConfigManager::new(ConfigOptions {
        enforce_security: false,
        ..Default::default()
    })
    .load(Some(source))
    .unwrap()
}

#[test]
fn test_production_requires_https() {
    let validator = SecurityValidator::new(true);

    let insecure = validator.validate(&unchecked(&servers_source(&[(
        "docs",
        "http://mcp.example.com/sse",
    )])));
    assert!(!insecure.is_secure());
    assert!(insecure.errors[0].contains("'http'"));

    let secure = validator.validate(&unchecked(&servers_source(&[(
        "docs",
        "https://mcp.example.com/sse",
    )])));
    assert!(secure.is_secure(), "{:?}", secure.errors);
}

#[test]
fn test_development_only_warns_on_http() {
    let report = SecurityValidator::new(false).validate(&unchecked(&servers_source(&[(
        "docs",
        "http://mcp.example.com/sse",
    )])));
    assert!(report.is_secure());
    assert_eq!(report.warnings.len(), 1);
}

#[test]
fn test_restricted_port() {
    let report = SecurityValidator::new(false).validate(&unchecked(&servers_source(&[(
        "docs",
        "https://mcp.example.com:22",
    )])));
    assert!(!report.is_secure());
}

#[test]
fn test_private_hosts_in_production() {
    let config = unchecked(&servers_source(&[
        ("local", "https://localhost:8443"),
        ("lan", "https://10.1.2.3"),
    ]));

    assert!(SecurityValidator::new(false).validate(&config).is_secure());
    assert_eq!(SecurityValidator::new(true).validate(&config).errors.len(), 2);
}

#[test]
fn test_endpoint_count_limit() {
    let servers: Vec<(String, String)> = (0..=MAX_ENDPOINTS)
        .map(|i| (format!("s{}", i), format!("https://s{}.example.com", i)))
        .collect();
    let pairs: Vec<(&str, &str)> = servers
        .iter()
        .map(|(c, e)| (c.as_str(), e.as_str()))
        .collect();

    let report = SecurityValidator::new(false).validate(&unchecked(&servers_source(&pairs)));
    assert!(report.errors.iter().any(|e| e.contains("Too many endpoints")));
}

#[test]
fn test_oversized_source_is_rejected_before_parsing() {
    let source = format!("{{\"docs\": \"https://mcp.example.com/{}\"}}", "a".repeat(MAX_CONFIG_SIZE));
    let report = SecurityValidator::new(false).validate_source(&source);
    assert!(!report.is_secure());

    let err = ConfigManager::default().load(Some(&source)).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert!(err.message().starts_with("Security validation failed"));
}

#[test]
fn test_injection_in_capability_name() {
    let validator = SecurityValidator::new(false);
    for name in ["a;b", "${HOME}", "../etc", "__proto__", "<x>"] {
        let mut report = SecurityReport::default();
        validator.check_capability_name(name, &mut report);
        assert!(!report.is_secure(), "{:?} should be rejected", name);
    }

    let mut report = SecurityReport::default();
    validator.check_capability_name("jira-cloud_1", &mut report);
    assert!(report.is_secure());
}
