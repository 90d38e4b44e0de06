//! ConfigOptions environment parsing tests

use std::collections::HashMap;

use capmux_core::{ConfigManager, ConfigOptions, ErrorCategory};
use pretty_assertions::assert_eq;

fn options(vars: &[(&str, &str)]) -> capmux_core::McpResult<ConfigOptions> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    ConfigOptions::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn test_defaults_without_variables() {
    let options = options(&[]).unwrap();
    assert_eq!(options, ConfigOptions::default());
    assert_eq!(options.default_timeout, 30);
    assert_eq!(options.health_check_interval, 60);
    assert_eq!(options.max_retries, 3);
    assert!(!options.production_mode);
}

#[test]
fn test_overrides_apply_to_loaded_configuration() {
    let options = options(&[
        ("MCP_DEFAULT_TIMEOUT", "12"),
        ("MCP_HEALTH_CHECK_INTERVAL", "5"),
        ("MCP_MAX_RETRIES", "0"),
    ])
    .unwrap();

    let config = ConfigManager::new(options)
        .load(Some(r#"{"docs": "https://mcp.example.com"}"#))
        .unwrap();
    assert_eq!(config.default_timeout(), 12);
    assert_eq!(config.health_check_interval(), 5);
    assert_eq!(config.max_retries(), 0);
    assert_eq!(config.get_server("docs").unwrap().timeout, 12);
}

#[test]
fn test_production_mode_flag() {
    for raw in ["1", "true", "YES"] {
        assert!(options(&[("MCP_PRODUCTION_MODE", raw)]).unwrap().production_mode);
    }
    assert!(!options(&[("MCP_PRODUCTION_MODE", "off")]).unwrap().production_mode);
}

#[test]
fn test_production_mode_rejects_http_source() {
    let options = options(&[("MCP_PRODUCTION_MODE", "true")]).unwrap();
    let manager = ConfigManager::new(options);

    let err = manager
        .load(Some(r#"{"docs": "http://mcp.example.com"}"#))
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Configuration);

    assert!(manager
        .load(Some(r#"{"docs": "https://mcp.example.com"}"#))
        .is_ok());
}

#[test]
fn test_invalid_numbers_are_rejected() {
    for (key, raw) in [
        ("MCP_DEFAULT_TIMEOUT", "0"),
        ("MCP_DEFAULT_TIMEOUT", "soon"),
        ("MCP_HEALTH_CHECK_INTERVAL", "-1"),
        ("MCP_MAX_RETRIES", "many"),
    ] {
        let err = options(&[(key, raw)]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.message().contains(key));
    }
}
