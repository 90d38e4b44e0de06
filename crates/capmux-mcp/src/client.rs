//! Client facade
//!
//! [`McpClient`] is the only surface upstream orchestration code needs:
//! `connect_all`, `query`, `health_check` and `get_server_status`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use capmux_core::config::MCP_SERVERS_ENV;
use capmux_core::{
    ConfigManager, ConfigOptions, Configuration, ConnectionType, ErrorContext, ErrorHandler,
    McpError, McpResult,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::connection::ConnectionFactory;
use crate::connection_pool::{ConnectionPool, DEFAULT_MAX_CONNECTIONS};
use crate::routing::CapabilityRouter;

/// Construction options for [`McpClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub config: ConfigOptions,
    /// Raw `MCP_SERVERS` value; `None` falls back to the default server
    pub source: Option<String>,
    /// Build mock connections for every server
    pub use_mock: bool,
    pub max_connections: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            config: ConfigOptions::default(),
            source: None,
            use_mock: false,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl ClientOptions {
    /// Options and source read from the environment
    pub fn from_env() -> McpResult<Self> {
        Ok(Self {
            config: ConfigOptions::from_env()?,
            source: std::env::var(MCP_SERVERS_ENV).ok(),
            ..Default::default()
        })
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_mock(mut self, use_mock: bool) -> Self {
        self.use_mock = use_mock;
        self
    }
}

/// Outcome of [`McpClient::connect_all`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectSummary {
    pub connected: Vec<String>,
    /// Capability → reason
    pub failed: BTreeMap<String, String>,
}

impl ConnectSummary {
    pub fn success_count(&self) -> usize {
        self.connected.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }
}

/// Reply to a routed query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    /// Capability that answered
    pub capability: String,
    /// Capability the request was routed to before any fallback
    pub requested_capability: String,
    pub fallback_used: bool,
    pub message_id: String,
    pub response: Value,
}

/// Per-capability status report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerStatus {
    pub capability: String,
    pub endpoint: String,
    pub connection_type: Option<ConnectionType>,
    pub enabled: bool,
    pub connected: bool,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
}

/// Capability-routed client over a pool of MCP servers
pub struct McpClient {
    config: Configuration,
    pool: Arc<ConnectionPool>,
    router: CapabilityRouter,
    use_mock: bool,
    errors: ErrorHandler,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl McpClient {
    /// Load configuration and build the client; configuration errors fail here
    pub fn new(options: ClientOptions) -> McpResult<Self> {
        let config = ConfigManager::new(options.config.clone()).load(options.source.as_deref())?;
        Ok(Self::from_configuration(config, &options))
    }

    /// Build from the environment (`MCP_SERVERS` and companions)
    pub fn from_env() -> McpResult<Self> {
        Self::new(ClientOptions::from_env()?)
    }

    pub fn from_configuration(config: Configuration, options: &ClientOptions) -> Self {
        let pool = ConnectionPool::new(options.max_connections)
            .with_default_timeout(Duration::from_secs(config.default_timeout()));
        let router = CapabilityRouter::from_configuration(&config);

        Self {
            config,
            pool: Arc::new(pool),
            router,
            use_mock: options.use_mock,
            errors: ErrorHandler::new(),
            monitor: Mutex::new(None),
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Capability → endpoint for every configured server
    pub fn server_endpoints(&self) -> HashMap<String, String> {
        self.config.get_server_endpoints()
    }

    /// Connect every enabled server concurrently
    ///
    /// Individual failures are collected, never propagated.
    pub async fn connect_all(&self) -> ConnectSummary {
        let servers = self.config.get_enabled_servers();
        info!(servers = servers.len(), "Connecting to MCP servers");

        let attempts = servers.into_iter().map(|server| async move {
            let ok = self.pool.add_server(server, self.use_mock).await;
            (server.capability.clone(), ok)
        });

        let mut summary = ConnectSummary::default();
        for (capability, ok) in join_all(attempts).await {
            if ok {
                summary.connected.push(capability);
            } else {
                let reason = self.failure_reason(&capability);
                summary.failed.insert(capability, reason);
            }
        }

        info!(
            connected = summary.success_count(),
            failed = summary.failure_count(),
            "Finished connecting to MCP servers"
        );
        summary
    }

    /// Connect a single configured, enabled capability
    pub async fn connect(&self, capability: &str) -> McpResult<bool> {
        let context = || ErrorContext::new("connect").with_capability(capability);
        let server = self.config.get_server(capability).ok_or_else(|| {
            McpError::validation(format!("Unknown capability '{}'", capability))
                .with_context(context())
        })?;
        if !server.enabled {
            return Err(
                McpError::validation(format!("Capability '{}' is disabled", capability))
                    .with_context(context().with_endpoint(&server.endpoint)),
            );
        }
        Ok(self.pool.add_server(server, self.use_mock).await)
    }

    fn failure_reason(&self, capability: &str) -> String {
        if let Some(error) = self.pool.last_error(capability) {
            error
        } else if self.pool.contains(capability) {
            "connection is marked unhealthy".to_string()
        } else {
            "connection rejected: pool is full".to_string()
        }
    }

    /// Capability a request would be routed to
    pub fn detect_capability(&self, request: &str) -> Option<&str> {
        self.router.detect(request)
    }

    /// Route `request` to `capability` (or a detected one) and return the reply
    ///
    /// When the target has no live connection, or its send fails, the query is
    /// retried once on the first capability that passes a fresh health check.
    pub async fn query(&self, request: &str, capability: Option<&str>) -> McpResult<QueryResponse> {
        let message_id = Uuid::new_v4().to_string();
        let context = ErrorContext::new("query").with_message_id(&message_id);

        let target = match capability {
            Some(capability) if self.config.contains(capability) => capability.to_string(),
            Some(capability) => {
                let err = McpError::validation(format!("Unknown capability '{}'", capability))
                    .with_context(context.with_capability(capability));
                self.errors.record("query", &err);
                return Err(err);
            }
            None => match self.router.detect(request) {
                Some(detected) => detected.to_string(),
                None => {
                    let err = McpError::configuration("No capabilities configured")
                        .with_context(context);
                    self.errors.record("query", &err);
                    return Err(err);
                }
            },
        };
        debug!(capability = %target, message_id = %message_id, "Routing query");

        if self.pool.is_healthy(&target) {
            let payload = query_payload(&message_id, request, &target);
            match self.pool.send_message(&target, payload).await {
                Ok(response) => {
                    return Ok(QueryResponse {
                        capability: target.clone(),
                        requested_capability: target,
                        fallback_used: false,
                        message_id,
                        response,
                    })
                }
                Err(e) => {
                    self.errors.record("query", &e);
                }
            }
        }

        let health = self.pool.health_check().await;
        let fallback = self
            .config
            .capabilities()
            .into_iter()
            .find(|capability| health.get(*capability).copied().unwrap_or(false))
            .map(str::to_string);

        let Some(fallback) = fallback else {
            let err = McpError::connection("No healthy servers available")
                .with_context(context.with_capability(&target));
            self.errors.record("query", &err);
            return Err(err);
        };

        if fallback != target {
            warn!(from = %target, to = %fallback, "Target capability unavailable, using fallback");
        }

        let payload = query_payload(&message_id, request, &fallback);
        match self.pool.send_message(&fallback, payload).await {
            Ok(response) => Ok(QueryResponse {
                fallback_used: fallback != target,
                capability: fallback,
                requested_capability: target,
                message_id,
                response,
            }),
            Err(e) => {
                self.errors.record("query", &e);
                Err(e)
            }
        }
    }

    /// Ping every pooled connection
    pub async fn health_check(&self) -> HashMap<String, bool> {
        self.pool.health_check().await
    }

    /// Configured servers merged with pool state and health
    pub async fn get_server_status(&self) -> BTreeMap<String, ServerStatus> {
        let info = self.pool.get_connection_info().await;

        self.config
            .servers()
            .iter()
            .map(|server| {
                let pooled = info.get(&server.capability);
                let status = ServerStatus {
                    capability: server.capability.clone(),
                    endpoint: server.endpoint.clone(),
                    connection_type: pooled.map(|i| i.connection_type).or_else(|| {
                        if self.use_mock {
                            Some(ConnectionType::Mock)
                        } else {
                            server
                                .connection_type
                                .or_else(|| ConnectionFactory::detect_type(&server.endpoint))
                        }
                    }),
                    enabled: server.enabled,
                    connected: pooled.is_some_and(|i| i.connected),
                    healthy: pooled.is_some_and(|i| i.healthy),
                    last_error: self.pool.last_error(&server.capability),
                    connected_at: pooled.map(|i| i.connected_at),
                };
                (server.capability.clone(), status)
            })
            .collect()
    }

    /// Start a background task running `health_check` every
    /// `health_check_interval` seconds
    ///
    /// Must be called within a Tokio runtime. Returns `false` when a monitor
    /// is already running.
    pub fn spawn_health_monitor(&self) -> bool {
        let mut monitor = self.monitor.lock();
        if monitor.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let pool = Arc::clone(&self.pool);
        let interval = Duration::from_secs(self.config.health_check_interval().max(1));
        *monitor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let health = pool.health_check().await;
                let unhealthy = health.values().filter(|healthy| !**healthy).count();
                debug!(checked = health.len(), unhealthy, "Periodic health check");
            }
        }));
        info!(interval_secs = interval.as_secs(), "Health monitor started");
        true
    }

    fn stop_health_monitor(&self) {
        if let Some(handle) = self.monitor.lock().take() {
            handle.abort();
        }
    }

    /// Stop the health monitor and close every connection
    pub async fn disconnect_all(&self) {
        self.stop_health_monitor();
        self.pool.close_all().await;
    }

    /// Failure counts recorded by `query`, keyed by operation
    pub fn error_counts(&self) -> HashMap<String, u64> {
        self.errors.error_counts()
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.stop_health_monitor();
    }
}

fn query_payload(message_id: &str, request: &str, capability: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": message_id,
        "method": "query",
        "params": {
            "request": request,
            "capability": capability,
        }
    })
}
