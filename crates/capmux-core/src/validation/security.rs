//! Security policy over a whole configuration
//!
//! Checks run independently of endpoint syntax: size and count caps, timeout
//! bounds, scheme allow-list, capability-name hygiene, restricted ports and,
//! in production mode, private or loopback hosts.

use std::net::Ipv4Addr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use super::endpoint::{EndpointValidator, ParsedEndpoint};
use crate::config::Configuration;
use crate::error::{McpError, McpResult};

/// Maximum serialized configuration size in bytes
pub const MAX_CONFIG_SIZE: usize = 50 * 1024;
pub const MAX_ENDPOINTS: usize = 50;
pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 300;
pub const MAX_CAPABILITY_NAME_LEN: usize = 100;

/// Ports that never host an MCP server (ssh, telnet, smtp, pop3, imap)
pub const RESTRICTED_PORTS: [u16; 7] = [22, 23, 25, 110, 143, 993, 995];

lazy_static! {
    static ref INJECTION_PATTERNS: Vec<Regex> = vec![
        Regex::new(r#"[<>"']"#).unwrap(),
        Regex::new(r"[;|&]").unwrap(),
        Regex::new(r"\$\{").unwrap(),
        Regex::new(r"\.\./").unwrap(),
        Regex::new(r"^__\w*__$").unwrap(),
    ];
}

/// Findings of a security pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecurityReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl SecurityReport {
    pub fn is_secure(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fail with a configuration error listing every finding
    pub fn into_result(self) -> McpResult<Vec<String>> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(McpError::configuration(format!(
                "Security validation failed: {}",
                self.errors.join("; ")
            )))
        }
    }

    fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    fn warning(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Applies the security policy; stricter when `production_mode` is set
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityValidator {
    production_mode: bool,
}

impl SecurityValidator {
    pub fn new(production_mode: bool) -> Self {
        Self { production_mode }
    }

    pub fn production_mode(&self) -> bool {
        self.production_mode
    }

    /// Size check on the raw source, done before parsing
    pub fn validate_source(&self, source: &str) -> SecurityReport {
        let mut report = SecurityReport::default();
        check_size(source.len(), &mut report);
        report
    }

    pub fn validate(&self, config: &Configuration) -> SecurityReport {
        let mut report = SecurityReport::default();

        match serde_json::to_string(&config.servers_json()) {
            Ok(serialized) => check_size(serialized.len(), &mut report),
            Err(e) => report.error(format!("Configuration cannot be serialized: {}", e)),
        }

        if config.len() > MAX_ENDPOINTS {
            report.error(format!(
                "Too many endpoints: {} (max {})",
                config.len(),
                MAX_ENDPOINTS
            ));
        }

        for server in config.servers() {
            self.check_capability_name(&server.capability, &mut report);

            if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&server.timeout) {
                report.error(format!(
                    "Server '{}': timeout {}s outside allowed range {}-{}s",
                    server.capability, server.timeout, MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS
                ));
            }

            self.check_endpoint(&server.capability, &server.endpoint, &mut report);
        }

        report
    }

    /// Validate a single capability name
    pub fn check_capability_name(&self, name: &str, report: &mut SecurityReport) {
        if name.len() > MAX_CAPABILITY_NAME_LEN {
            report.error(format!(
                "Capability name too long: {} characters (max {})",
                name.len(),
                MAX_CAPABILITY_NAME_LEN
            ));
        }
        if INJECTION_PATTERNS.iter().any(|pattern| pattern.is_match(name)) {
            report.error(format!(
                "Capability name '{}' contains disallowed characters",
                name
            ));
        }
    }

    fn check_endpoint(&self, capability: &str, endpoint: &str, report: &mut SecurityReport) {
        let validation = EndpointValidator::validate(endpoint);
        let Some(parsed) = validation.parsed else {
            report.error(format!(
                "Server '{}': endpoint not recognized: {}",
                capability,
                validation.error_message.unwrap_or_default()
            ));
            return;
        };

        if let ParsedEndpoint::ExternalRoute { scheme, .. } = &parsed {
            if scheme == "http" {
                if self.production_mode {
                    report.error(format!(
                        "Server '{}': insecure scheme 'http' not allowed in production, use https",
                        capability
                    ));
                } else {
                    report.warning(format!(
                        "Server '{}': using insecure scheme 'http' ({})",
                        capability, endpoint
                    ));
                }
            }
        }

        if let Some(port) = parsed.port() {
            if RESTRICTED_PORTS.contains(&port) {
                report.error(format!(
                    "Server '{}': port {} is restricted",
                    capability, port
                ));
            }
        }

        if self.production_mode && is_private_host(&parsed.host()) {
            report.error(format!(
                "Server '{}': private or loopback host '{}' not allowed in production",
                capability,
                parsed.host()
            ));
        }
    }
}

fn check_size(len: usize, report: &mut SecurityReport) {
    if len > MAX_CONFIG_SIZE {
        report.error(format!(
            "Configuration too large: {} bytes (max {})",
            len, MAX_CONFIG_SIZE
        ));
    }
}

/// Loopback, private, link-local or unspecified address, or a localhost name
pub fn is_private_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }
    match host.parse::<Ipv4Addr>() {
        Ok(ip) => ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified(),
        Err(_) => false,
    }
}
