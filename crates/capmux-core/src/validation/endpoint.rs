//! Endpoint classification
//!
//! Two address families are accepted:
//!
//! - External route: `scheme://host[:port][/path]` with scheme `http` or `https`
//! - Cluster service: `service.namespace.svc.cluster.local[:port]`
//!
//! Anything else is rejected with a message describing the first problem found.

use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref HOST_LABEL: Regex = Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?$").unwrap();
    static ref K8S_NAME: Regex = Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap();
    static ref URL_PATH: Regex = Regex::new(r"^[A-Za-z0-9\-./]*$").unwrap();
}

pub const CLUSTER_SUFFIX: &str = ".svc.cluster.local";
pub const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];

const MAX_HOSTNAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// Address family of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointType {
    ExternalRoute,
    ClusterService,
    None,
}

/// Components extracted from a valid endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParsedEndpoint {
    ExternalRoute {
        scheme: String,
        host: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        port: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    ClusterService {
        service: String,
        namespace: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        port: Option<u16>,
    },
}

impl ParsedEndpoint {
    pub fn port(&self) -> Option<u16> {
        match self {
            ParsedEndpoint::ExternalRoute { port, .. } => *port,
            ParsedEndpoint::ClusterService { port, .. } => *port,
        }
    }

    /// Host name as it would be resolved
    pub fn host(&self) -> String {
        match self {
            ParsedEndpoint::ExternalRoute { host, .. } => host.clone(),
            ParsedEndpoint::ClusterService {
                service, namespace, ..
            } => format!("{}.{}{}", service, namespace, CLUSTER_SUFFIX),
        }
    }

    pub fn scheme(&self) -> Option<&str> {
        match self {
            ParsedEndpoint::ExternalRoute { scheme, .. } => Some(scheme),
            ParsedEndpoint::ClusterService { .. } => None,
        }
    }
}

/// Outcome of validating one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub endpoint_type: EndpointType,
    #[serde(rename = "parsed_info", skip_serializing_if = "Option::is_none")]
    pub parsed: Option<ParsedEndpoint>,
}

impl ValidationResult {
    fn ok(parsed: ParsedEndpoint) -> Self {
        let endpoint_type = match parsed {
            ParsedEndpoint::ExternalRoute { .. } => EndpointType::ExternalRoute,
            ParsedEndpoint::ClusterService { .. } => EndpointType::ClusterService,
        };
        Self {
            valid: true,
            error_message: None,
            endpoint_type,
            parsed: Some(parsed),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error_message: Some(message.into()),
            endpoint_type: EndpointType::None,
            parsed: None,
        }
    }

    /// Flat string view of the parsed components
    pub fn parsed_info(&self) -> BTreeMap<String, String> {
        let mut info = BTreeMap::new();
        match &self.parsed {
            Some(ParsedEndpoint::ExternalRoute {
                scheme,
                host,
                port,
                path,
            }) => {
                info.insert("scheme".to_string(), scheme.clone());
                info.insert("host".to_string(), host.clone());
                if let Some(port) = port {
                    info.insert("port".to_string(), port.to_string());
                }
                if let Some(path) = path {
                    info.insert("path".to_string(), path.clone());
                }
            }
            Some(ParsedEndpoint::ClusterService {
                service,
                namespace,
                port,
            }) => {
                info.insert("service".to_string(), service.clone());
                info.insert("namespace".to_string(), namespace.clone());
                if let Some(port) = port {
                    info.insert("port".to_string(), port.to_string());
                }
            }
            None => {}
        }
        info
    }
}

/// Aggregate verdict over a capability→endpoint map
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigurationValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub results: BTreeMap<String, ValidationResult>,
}

/// Stateless endpoint validator
pub struct EndpointValidator;

impl EndpointValidator {
    /// Classify and validate a single endpoint
    pub fn validate(endpoint: &str) -> ValidationResult {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return ValidationResult::invalid("Endpoint cannot be empty");
        }

        if endpoint.contains("://") {
            return Self::validate_external_route(endpoint);
        }

        if endpoint.contains(".svc") || endpoint.contains("cluster.local") {
            return Self::validate_cluster_service(endpoint);
        }

        ValidationResult::invalid(format!(
            "Unrecognized endpoint format '{}': expected scheme://host[:port][/path] or service.namespace{}[:port]",
            endpoint, CLUSTER_SUFFIX
        ))
    }

    /// Validate each entry independently
    pub fn validate_configuration<I, K, V>(servers: I) -> BTreeMap<String, ValidationResult>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        servers
            .into_iter()
            .map(|(capability, endpoint)| (capability.into(), Self::validate(endpoint.as_ref())))
            .collect()
    }

    /// Validate a whole map; invalid if empty or if any entry fails
    pub fn validate_configuration_map(servers: &HashMap<String, String>) -> ConfigurationValidation {
        let results = Self::validate_configuration(servers.iter());
        let mut errors: Vec<String> = results
            .iter()
            .filter(|(_, result)| !result.valid)
            .map(|(capability, result)| {
                format!(
                    "{}: {}",
                    capability,
                    result.error_message.as_deref().unwrap_or("invalid endpoint")
                )
            })
            .collect();

        if results.is_empty() {
            errors.push("Configuration must contain at least one server".to_string());
        }

        ConfigurationValidation {
            valid: errors.is_empty(),
            errors,
            results,
        }
    }

    fn validate_external_route(endpoint: &str) -> ValidationResult {
        let Some((scheme, rest)) = endpoint.split_once("://") else {
            return ValidationResult::invalid("Missing scheme separator '://'");
        };

        let scheme = scheme.to_ascii_lowercase();
        if !ALLOWED_SCHEMES.contains(&scheme.as_str()) {
            return ValidationResult::invalid(format!(
                "Unsupported scheme '{}': only http and https are allowed",
                scheme
            ));
        }

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], Some(&rest[idx..])),
            None => (rest, None),
        };

        if authority.contains('@') {
            return ValidationResult::invalid("Credentials are not allowed in the endpoint");
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => match parse_port(port) {
                Ok(port) => (host, Some(port)),
                Err(message) => return ValidationResult::invalid(message),
            },
            None => (authority, None),
        };

        if host.is_empty() {
            return ValidationResult::invalid("Missing host in endpoint");
        }
        if let Err(message) = validate_hostname(host) {
            return ValidationResult::invalid(message);
        }

        if let Some(path) = path {
            if !URL_PATH.is_match(path) {
                return ValidationResult::invalid(format!(
                    "Invalid characters in path '{}': only letters, digits, '-', '.' and '/' are allowed",
                    path
                ));
            }
        }

        ValidationResult::ok(ParsedEndpoint::ExternalRoute {
            scheme,
            host: host.to_string(),
            port,
            path: path.map(str::to_string),
        })
    }

    fn validate_cluster_service(endpoint: &str) -> ValidationResult {
        let (host, port) = match endpoint.rsplit_once(':') {
            Some((host, port)) => match parse_port(port) {
                Ok(port) => (host, Some(port)),
                Err(message) => return ValidationResult::invalid(message),
            },
            None => (endpoint, None),
        };

        let Some(prefix) = host.strip_suffix(CLUSTER_SUFFIX) else {
            let message = if host.contains(".svc") {
                format!(
                    "Incomplete cluster service suffix in '{}': expected '{}'",
                    host, CLUSTER_SUFFIX
                )
            } else {
                format!(
                    "Invalid cluster service suffix in '{}': expected '{}'",
                    host, CLUSTER_SUFFIX
                )
            };
            return ValidationResult::invalid(message);
        };

        let parts: Vec<&str> = prefix.split('.').collect();
        let [service, namespace] = parts.as_slice() else {
            return ValidationResult::invalid(format!(
                "Cluster service endpoint must be service.namespace{}, got '{}'",
                CLUSTER_SUFFIX, host
            ));
        };

        if let Err(message) = validate_k8s_name(service, "service") {
            return ValidationResult::invalid(message);
        }
        if let Err(message) = validate_k8s_name(namespace, "namespace") {
            return ValidationResult::invalid(message);
        }

        ValidationResult::ok(ParsedEndpoint::ClusterService {
            service: service.to_string(),
            namespace: namespace.to_string(),
            port,
        })
    }
}

fn parse_port(raw: &str) -> Result<u16, String> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("Invalid port '{}': must be a number", raw));
    }
    match raw.parse::<u32>() {
        Ok(port) if (1..=65535).contains(&port) => Ok(port as u16),
        _ => Err(format!("Invalid port '{}': must be between 1 and 65535", raw)),
    }
}

fn validate_hostname(host: &str) -> Result<(), String> {
    if host.len() > MAX_HOSTNAME_LEN {
        return Err(format!(
            "Hostname too long: {} characters (max {})",
            host.len(),
            MAX_HOSTNAME_LEN
        ));
    }
    for label in host.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN || !HOST_LABEL.is_match(label) {
            return Err(format!("Invalid hostname '{}': bad label '{}'", host, label));
        }
    }
    Ok(())
}

fn validate_k8s_name(name: &str, kind: &str) -> Result<(), String> {
    if name.is_empty() || name.len() > MAX_LABEL_LEN || !K8S_NAME.is_match(name) {
        return Err(format!(
            "Invalid {} name '{}': must be lowercase alphanumeric or '-', at most {} characters, not starting or ending with '-'",
            kind, name, MAX_LABEL_LEN
        ));
    }
    Ok(())
}
