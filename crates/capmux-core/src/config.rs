//! Multi-server configuration
//!
//! The configuration comes from a single string (conventionally the
//! `MCP_SERVERS` environment variable) holding a JSON object that maps a
//! capability name to either an endpoint string or a server object:
//!
//! ```json
//! {
//!   "docs": "https://mcp.example.com/sse",
//!   "jira": { "endpoint": "jira-mcp.tools.svc.cluster.local:8080", "timeout": 60 }
//! }
//! ```
//!
//! A [`Configuration`] is built once and never mutated; reloading produces a
//! new instance.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{ErrorContext, McpError, McpResult};
use crate::validation::{EndpointType, EndpointValidator, SecurityValidator};

pub const MCP_SERVERS_ENV: &str = "MCP_SERVERS";
pub const MCP_DEFAULT_TIMEOUT_ENV: &str = "MCP_DEFAULT_TIMEOUT";
pub const MCP_HEALTH_CHECK_INTERVAL_ENV: &str = "MCP_HEALTH_CHECK_INTERVAL";
pub const MCP_MAX_RETRIES_ENV: &str = "MCP_MAX_RETRIES";
pub const MCP_PRODUCTION_MODE_ENV: &str = "MCP_PRODUCTION_MODE";

pub const DEFAULT_CAPABILITY: &str = "default";
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/mcp";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const OPERATION: &str = "load_configuration";

/// Explicit connection variant requested for a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    Mock,
    ExternalRoute,
    ClusterService,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Mock => "mock",
            ConnectionType::ExternalRoute => "external_route",
            ConnectionType::ClusterService => "cluster_service",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionType {
    type Err = McpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "mock" => Ok(ConnectionType::Mock),
            "external_route" => Ok(ConnectionType::ExternalRoute),
            "cluster_service" => Ok(ConnectionType::ClusterService),
            other => Err(McpError::configuration(format!(
                "Unknown connection type '{}': expected mock, external_route or cluster_service",
                other
            ))),
        }
    }
}

/// One configured backend server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    /// Capability name, unique within a configuration
    #[serde(skip)]
    pub capability: String,
    pub endpoint: String,
    /// Send timeout in seconds
    pub timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<ConnectionType>,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ServerConfig {
    pub fn new(capability: impl Into<String>, endpoint: impl Into<String>, timeout: u64) -> Self {
        Self {
            capability: capability.into(),
            endpoint: endpoint.into(),
            timeout,
            connection_type: None,
            enabled: true,
            metadata: Map::new(),
        }
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Address family of the endpoint
    pub fn endpoint_type(&self) -> EndpointType {
        EndpointValidator::validate(&self.endpoint).endpoint_type
    }

    /// Boolean metadata flag, false when absent or not a bool
    pub fn metadata_flag(&self, key: &str) -> bool {
        self.metadata.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Routing keywords from `metadata.keywords`
    pub fn keywords(&self) -> Vec<String> {
        self.metadata
            .get("keywords")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_lowercase)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn type_label(&self) -> String {
        match self.connection_type {
            Some(kind) => kind.to_string(),
            None => match self.endpoint_type() {
                EndpointType::ExternalRoute => "external_route".to_string(),
                EndpointType::ClusterService => "cluster_service".to_string(),
                EndpointType::None => "unknown".to_string(),
            },
        }
    }
}

/// Validated multi-server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    servers: Vec<ServerConfig>,
    default_timeout: u64,
    health_check_interval: u64,
    max_retries: u32,
}

impl Configuration {
    fn build(servers: Vec<ServerConfig>, options: &ConfigOptions) -> McpResult<Self> {
        if servers.is_empty() {
            return Err(McpError::configuration(
                "Configuration must contain at least one server",
            ));
        }

        let mut seen = HashSet::new();
        for server in &servers {
            if !seen.insert(server.capability.as_str()) {
                return Err(McpError::configuration(format!(
                    "Duplicate capability '{}'",
                    server.capability
                ))
                .with_context(ErrorContext::new(OPERATION).with_capability(&server.capability)));
            }

            let result = EndpointValidator::validate(&server.endpoint);
            if !result.valid {
                return Err(McpError::configuration(format!(
                    "Server '{}' endpoint not recognized: {}",
                    server.capability,
                    result.error_message.unwrap_or_default()
                ))
                .with_context(
                    ErrorContext::new(OPERATION)
                        .with_capability(&server.capability)
                        .with_endpoint(&server.endpoint),
                ));
            }
        }

        Ok(Self {
            servers,
            default_timeout: options.default_timeout,
            health_check_interval: options.health_check_interval,
            max_retries: options.max_retries,
        })
    }

    /// Build from a capability→endpoint map, applying default options
    pub fn from_endpoints<I, K, V>(servers: I) -> McpResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let options = ConfigOptions::default();
        let servers = servers
            .into_iter()
            .map(|(capability, endpoint)| {
                let endpoint: String = endpoint.into();
                ServerConfig::new(capability, endpoint.trim(), options.default_timeout)
            })
            .collect();
        Self::build(servers, &options)
    }

    /// Servers in configuration order
    pub fn servers(&self) -> &[ServerConfig] {
        &self.servers
    }

    /// Send timeout in seconds applied to servers without their own
    pub fn default_timeout(&self) -> u64 {
        self.default_timeout
    }

    /// Seconds between background health checks
    pub fn health_check_interval(&self) -> u64 {
        self.health_check_interval
    }

    /// Tracked for callers; never applied automatically
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn get_server(&self, capability: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.capability == capability)
    }

    pub fn contains(&self, capability: &str) -> bool {
        self.get_server(capability).is_some()
    }

    pub fn get_enabled_servers(&self) -> Vec<&ServerConfig> {
        self.servers.iter().filter(|s| s.enabled).collect()
    }

    /// Capability→endpoint for every configured server
    pub fn get_server_endpoints(&self) -> HashMap<String, String> {
        self.servers
            .iter()
            .map(|s| (s.capability.clone(), s.endpoint.clone()))
            .collect()
    }

    /// Capability names in configuration order
    pub fn capabilities(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.capability.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// The `MCP_SERVERS` object for this configuration
    pub fn servers_json(&self) -> Map<String, Value> {
        self.servers
            .iter()
            .map(|s| {
                let value = serde_json::to_value(s).unwrap_or(Value::Null);
                (s.capability.clone(), value)
            })
            .collect()
    }

    /// Flat deployment environment, reloadable through [`ConfigManager::load`]
    pub fn to_deployment_env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert(
            MCP_SERVERS_ENV.to_string(),
            Value::Object(self.servers_json()).to_string(),
        );
        env.insert(
            MCP_DEFAULT_TIMEOUT_ENV.to_string(),
            self.default_timeout.to_string(),
        );
        env.insert(
            MCP_HEALTH_CHECK_INTERVAL_ENV.to_string(),
            self.health_check_interval.to_string(),
        );
        env.insert(MCP_MAX_RETRIES_ENV.to_string(), self.max_retries.to_string());
        env
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "MCP configuration: {} server(s), {} enabled",
            self.len(),
            self.get_enabled_servers().len()
        )];
        for server in &self.servers {
            let state = if server.enabled { "" } else { ", disabled" };
            lines.push(format!(
                "  - {} -> {} [{}, timeout {}s{}]",
                server.capability,
                server.endpoint,
                server.type_label(),
                server.timeout,
                state
            ));
        }
        lines.push(format!(
            "Default timeout {}s, health check every {}s, max retries {}",
            self.default_timeout, self.health_check_interval, self.max_retries
        ));
        lines.join("\n")
    }
}

/// Knobs applied while loading
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigOptions {
    pub default_timeout: u64,
    pub health_check_interval: u64,
    pub max_retries: u32,
    /// Stricter security pass: https only, no private hosts
    pub production_mode: bool,
    /// Run the security pass on operator-supplied sources
    pub enforce_security: bool,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT_SECS,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            production_mode: false,
            enforce_security: true,
        }
    }
}

impl ConfigOptions {
    /// Read `MCP_DEFAULT_TIMEOUT`, `MCP_HEALTH_CHECK_INTERVAL`, `MCP_MAX_RETRIES`
    /// and `MCP_PRODUCTION_MODE`
    pub fn from_env() -> McpResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ConfigOptions::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> McpResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            default_timeout: parse_positive(&lookup, MCP_DEFAULT_TIMEOUT_ENV, defaults.default_timeout)?,
            health_check_interval: parse_positive(
                &lookup,
                MCP_HEALTH_CHECK_INTERVAL_ENV,
                defaults.health_check_interval,
            )?,
            max_retries: match lookup(MCP_MAX_RETRIES_ENV) {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    McpError::configuration(format!(
                        "{} must be a non-negative integer, got '{}'",
                        MCP_MAX_RETRIES_ENV, raw
                    ))
                })?,
                None => defaults.max_retries,
            },
            production_mode: lookup(MCP_PRODUCTION_MODE_ENV)
                .map(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.production_mode),
            enforce_security: defaults.enforce_security,
        })
    }
}

fn parse_positive<F>(lookup: &F, key: &str, default: u64) -> McpResult<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(McpError::configuration(format!(
                "{} must be a positive integer, got '{}'",
                key, raw
            ))),
        },
        None => Ok(default),
    }
}

/// Parses and validates configuration sources
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    options: ConfigOptions,
}

impl ConfigManager {
    pub fn new(options: ConfigOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConfigOptions {
        &self.options
    }

    /// Load from `MCP_SERVERS` and the companion environment variables
    pub fn from_env() -> McpResult<Configuration> {
        let options = ConfigOptions::from_env()?;
        let source = std::env::var(MCP_SERVERS_ENV).ok();
        Self::new(options).load(source.as_deref())
    }

    /// Parse `source`; absent or blank yields the single default server
    pub fn load(&self, source: Option<&str>) -> McpResult<Configuration> {
        let source = match source.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => {
                info!(
                    capability = DEFAULT_CAPABILITY,
                    endpoint = DEFAULT_ENDPOINT,
                    "No server configuration provided, using default server"
                );
                let server = ServerConfig::new(
                    DEFAULT_CAPABILITY,
                    DEFAULT_ENDPOINT,
                    self.options.default_timeout,
                );
                return Configuration::build(vec![server], &self.options);
            }
        };

        let security = SecurityValidator::new(self.options.production_mode);
        if self.options.enforce_security {
            security
                .validate_source(source)
                .into_result()
                .map_err(|e| e.in_operation(OPERATION))?;
        }

        let parsed: Value = serde_json::from_str(source).map_err(|e| {
            McpError::configuration(format!("Invalid JSON in {}: {}", MCP_SERVERS_ENV, e))
                .with_context(ErrorContext::new(OPERATION))
        })?;

        let Value::Object(entries) = parsed else {
            return Err(McpError::configuration(format!(
                "{} must be a JSON object mapping capability names to endpoints",
                MCP_SERVERS_ENV
            ))
            .with_context(ErrorContext::new(OPERATION)));
        };

        if entries.is_empty() {
            return Err(McpError::configuration(format!(
                "{} must contain at least one server",
                MCP_SERVERS_ENV
            ))
            .with_context(ErrorContext::new(OPERATION)));
        }

        let servers = entries
            .into_iter()
            .map(|(capability, value)| self.parse_entry(capability, value))
            .collect::<McpResult<Vec<_>>>()?;

        let config = Configuration::build(servers, &self.options)?;

        if self.options.enforce_security {
            let warnings = security
                .validate(&config)
                .into_result()
                .map_err(|e| e.in_operation(OPERATION))?;
            debug!(warnings = warnings.len(), "Security validation passed");
        }

        info!(
            servers = config.len(),
            enabled = config.get_enabled_servers().len(),
            "Loaded MCP server configuration"
        );
        Ok(config)
    }

    fn parse_entry(&self, capability: String, value: Value) -> McpResult<ServerConfig> {
        let fail = |message: String| {
            McpError::configuration(message)
                .with_context(ErrorContext::new(OPERATION).with_capability(&capability))
        };

        if capability.trim().is_empty() {
            return Err(fail("Capability name cannot be empty".to_string()));
        }

        match value {
            Value::String(endpoint) => Ok(ServerConfig::new(
                capability.clone(),
                endpoint.trim(),
                self.options.default_timeout,
            )),
            Value::Object(mut fields) => {
                let endpoint = match fields.remove("endpoint") {
                    Some(Value::String(endpoint)) => endpoint.trim().to_string(),
                    Some(_) => {
                        return Err(fail(format!(
                            "Server '{}': 'endpoint' must be a string",
                            capability
                        )))
                    }
                    None => {
                        return Err(fail(format!(
                            "Server '{}' is missing required 'endpoint' field",
                            capability
                        )))
                    }
                };

                let timeout = match fields.remove("timeout") {
                    None | Some(Value::Null) => self.options.default_timeout,
                    Some(value) => match value.as_u64() {
                        Some(timeout) if timeout > 0 => timeout,
                        _ => {
                            return Err(fail(format!(
                                "Server '{}': timeout must be a positive integer",
                                capability
                            )))
                        }
                    },
                };

                let connection_type = match fields.remove("connection_type") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(tag)) => Some(
                        tag.parse::<ConnectionType>()
                            .map_err(|e| fail(format!("Server '{}': {}", capability, e)))?,
                    ),
                    Some(_) => {
                        return Err(fail(format!(
                            "Server '{}': 'connection_type' must be a string",
                            capability
                        )))
                    }
                };

                let enabled = match fields.remove("enabled") {
                    None | Some(Value::Null) => true,
                    Some(Value::Bool(enabled)) => enabled,
                    Some(_) => {
                        return Err(fail(format!(
                            "Server '{}': 'enabled' must be a boolean",
                            capability
                        )))
                    }
                };

                let metadata = match fields.remove("metadata") {
                    None | Some(Value::Null) => Map::new(),
                    Some(Value::Object(metadata)) => metadata,
                    Some(_) => {
                        return Err(fail(format!(
                            "Server '{}': 'metadata' must be an object",
                            capability
                        )))
                    }
                };

                Ok(ServerConfig {
                    capability,
                    endpoint,
                    timeout,
                    connection_type,
                    enabled,
                    metadata,
                })
            }
            _ => Err(fail(format!(
                "Server '{}' must be an endpoint string or an object with an 'endpoint' field",
                capability
            ))),
        }
    }
}
