//! In-memory echo connection for running without network access

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use capmux_core::{ConnectionType, McpError, McpResult, ServerConfig};
use serde_json::{json, Value};
use tracing::debug;

use super::McpConnection;

/// Echoes every payload back; failures can be forced for tests
pub struct MockConnection {
    endpoint: String,
    timeout: Duration,
    connected: bool,
    fail_connect: bool,
    failing: Arc<AtomicBool>,
    latency: Option<Duration>,
    sent: AtomicU64,
}

impl MockConnection {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            connected: false,
            fail_connect: false,
            failing: Arc::new(AtomicBool::new(false)),
            latency: None,
            sent: AtomicU64::new(0),
        }
    }

    /// Honors metadata flags `fail_connect`, `fail_send` and `latency_ms`
    pub fn from_server(server: &ServerConfig) -> Self {
        let mut mock = Self::new(&server.endpoint, server.timeout_duration());
        mock.fail_connect = server.metadata_flag("fail_connect");
        mock.failing
            .store(server.metadata_flag("fail_send"), Ordering::SeqCst);
        mock.latency = server
            .metadata
            .get("latency_ms")
            .and_then(Value::as_u64)
            .map(Duration::from_millis);
        mock
    }

    /// `connect` will fail
    pub fn with_connect_failure(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Every send will fail
    pub fn with_send_failure(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    /// Delay each send by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Shared switch that makes sends fail while set
    pub fn failure_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.failing)
    }

    pub fn messages_sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl McpConnection for MockConnection {
    async fn connect(&mut self) -> McpResult<()> {
        if self.fail_connect {
            return Err(McpError::connection(format!(
                "Mock connection to {} forced to fail",
                self.endpoint
            ))
            .with_endpoint(&self.endpoint));
        }
        self.connected = true;
        debug!(endpoint = %self.endpoint, "Mock connection established");
        Ok(())
    }

    async fn send_message(&self, payload: Value) -> McpResult<Value> {
        if !self.connected {
            return Err(
                McpError::connection(format!("Not connected to {}", self.endpoint))
                    .with_endpoint(&self.endpoint),
            );
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(
                McpError::connection(format!("Mock send to {} failed", self.endpoint))
                    .with_endpoint(&self.endpoint),
            );
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(json!({
            "jsonrpc": "2.0",
            "id": payload.get("id").cloned().unwrap_or(Value::Null),
            "result": {
                "echo": payload,
                "endpoint": self.endpoint,
            }
        }))
    }

    async fn close(&mut self) -> McpResult<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn connection_type(&self) -> ConnectionType {
        ConnectionType::Mock
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
