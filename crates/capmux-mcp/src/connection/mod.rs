//! Connection contract and its variants
//!
//! [`McpConnection`] is the contract every variant fulfils. [`Connection`] is
//! the closed set of variants the pool works with, selected by
//! [`ConnectionFactory`] from an explicit type tag or the endpoint shape.

mod cluster_service;
mod external_route;
mod http;
mod mock;

use std::time::Duration;

use async_trait::async_trait;
use capmux_core::validation::CLUSTER_SUFFIX;
use capmux_core::{ConnectionType, McpError, McpResult, ServerConfig};
use serde_json::Value;
use uuid::Uuid;

pub use cluster_service::ClusterServiceConnection;
pub use external_route::ExternalRouteConnection;
pub use mock::MockConnection;

/// Contract shared by every connection variant
#[async_trait]
pub trait McpConnection: Send + Sync {
    /// Establish the underlying session
    async fn connect(&mut self) -> McpResult<()>;

    /// Send one message and wait for the reply
    ///
    /// Fails with a connection-category error when not connected.
    async fn send_message(&self, payload: Value) -> McpResult<Value>;

    /// Tear down the session; calling it twice is a no-op
    async fn close(&mut self) -> McpResult<()>;

    fn is_connected(&self) -> bool;

    fn endpoint(&self) -> &str;

    fn connection_type(&self) -> ConnectionType;

    /// Upper bound for a single send
    fn timeout(&self) -> Duration;
}

/// The closed set of connection variants
pub enum Connection {
    Mock(MockConnection),
    ExternalRoute(ExternalRouteConnection),
    ClusterService(ClusterServiceConnection),
}

impl Connection {
    fn inner(&self) -> &dyn McpConnection {
        match self {
            Connection::Mock(conn) => conn,
            Connection::ExternalRoute(conn) => conn,
            Connection::ClusterService(conn) => conn,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn McpConnection {
        match self {
            Connection::Mock(conn) => conn,
            Connection::ExternalRoute(conn) => conn,
            Connection::ClusterService(conn) => conn,
        }
    }
}

#[async_trait]
impl McpConnection for Connection {
    async fn connect(&mut self) -> McpResult<()> {
        let endpoint = self.endpoint().to_string();
        self.inner_mut()
            .connect()
            .await
            .map_err(|e| e.in_operation("connect").with_endpoint(endpoint))
    }

    /// Stamps a message id when the payload has none and enforces the timeout
    async fn send_message(&self, payload: Value) -> McpResult<Value> {
        let (payload, message_id) = stamp_message_id(payload);
        let timeout = self.timeout();

        let result = match tokio::time::timeout(timeout, self.inner().send_message(payload)).await {
            Ok(result) => result,
            Err(_) => Err(McpError::timeout(format!(
                "No response from {} within {:?}",
                self.endpoint(),
                timeout
            ))),
        };

        result.map_err(|e| {
            let e = e
                .in_operation("send_message")
                .with_endpoint(self.endpoint());
            match &message_id {
                Some(id) => e.with_message_id(id),
                None => e,
            }
        })
    }

    async fn close(&mut self) -> McpResult<()> {
        let endpoint = self.endpoint().to_string();
        self.inner_mut()
            .close()
            .await
            .map_err(|e| e.in_operation("close").with_endpoint(endpoint))
    }

    fn is_connected(&self) -> bool {
        self.inner().is_connected()
    }

    fn endpoint(&self) -> &str {
        self.inner().endpoint()
    }

    fn connection_type(&self) -> ConnectionType {
        self.inner().connection_type()
    }

    fn timeout(&self) -> Duration {
        self.inner().timeout()
    }
}

/// Give object payloads an `id` and report it
fn stamp_message_id(mut payload: Value) -> (Value, Option<String>) {
    let Value::Object(fields) = &mut payload else {
        return (payload, None);
    };
    let id = match fields.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => {
            let id = Uuid::new_v4().to_string();
            fields.insert("id".to_string(), Value::String(id.clone()));
            id
        }
    };
    (payload, Some(id))
}

/// Builds connections from endpoints or server configs
pub struct ConnectionFactory;

impl ConnectionFactory {
    /// Variant implied by the endpoint shape
    pub fn detect_type(endpoint: &str) -> Option<ConnectionType> {
        let endpoint = endpoint.trim();
        if endpoint.contains("://") {
            Some(ConnectionType::ExternalRoute)
        } else if endpoint.contains(CLUSTER_SUFFIX) {
            Some(ConnectionType::ClusterService)
        } else {
            None
        }
    }

    /// Explicit `connection_type` wins; otherwise the endpoint shape decides
    pub fn create(
        endpoint: &str,
        connection_type: Option<ConnectionType>,
        timeout: Duration,
    ) -> McpResult<Connection> {
        let kind = Self::resolve(endpoint, connection_type)?;
        Ok(match kind {
            ConnectionType::Mock => Connection::Mock(MockConnection::new(endpoint, timeout)),
            ConnectionType::ExternalRoute => {
                Connection::ExternalRoute(ExternalRouteConnection::new(endpoint, timeout, true)?)
            }
            ConnectionType::ClusterService => {
                Connection::ClusterService(ClusterServiceConnection::new(endpoint, timeout)?)
            }
        })
    }

    /// Build from a server config; `use_mock` forces the mock variant
    ///
    /// Metadata honored: `verify_ssl` (external routes), `path` (cluster
    /// services) and the mock flags described on [`MockConnection::from_server`].
    pub fn from_server(server: &ServerConfig, use_mock: bool) -> McpResult<Connection> {
        let kind = if use_mock {
            ConnectionType::Mock
        } else {
            Self::resolve(&server.endpoint, server.connection_type)?
        };
        let timeout = server.timeout_duration();

        Ok(match kind {
            ConnectionType::Mock => Connection::Mock(MockConnection::from_server(server)),
            ConnectionType::ExternalRoute => {
                let verify_tls = server
                    .metadata
                    .get("verify_ssl")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                Connection::ExternalRoute(ExternalRouteConnection::new(
                    &server.endpoint,
                    timeout,
                    verify_tls,
                )?)
            }
            ConnectionType::ClusterService => {
                let path = server.metadata.get("path").and_then(Value::as_str);
                Connection::ClusterService(ClusterServiceConnection::with_path(
                    &server.endpoint,
                    timeout,
                    path,
                )?)
            }
        })
    }

    fn resolve(endpoint: &str, explicit: Option<ConnectionType>) -> McpResult<ConnectionType> {
        explicit
            .or_else(|| Self::detect_type(endpoint))
            .ok_or_else(|| {
                McpError::validation(format!(
                    "Cannot determine connection type for endpoint '{}'",
                    endpoint
                ))
                .with_endpoint(endpoint)
            })
    }
}
