//! Connection to an in-cluster service (`*.svc.cluster.local`)

use std::time::Duration;

use async_trait::async_trait;
use capmux_core::validation::CLUSTER_SUFFIX;
use capmux_core::{ConnectionType, EndpointType, EndpointValidator, McpError, McpResult};
use serde_json::Value;
use tracing::info;
use url::Url;

use super::http::HttpSession;
use super::McpConnection;

/// Session against a Kubernetes service reachable through cluster DNS
pub struct ClusterServiceConnection {
    endpoint: String,
    url: Url,
    timeout: Duration,
    session: Option<HttpSession>,
}

impl ClusterServiceConnection {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> McpResult<Self> {
        Self::with_path(endpoint, timeout, None)
    }

    /// Same as [`ClusterServiceConnection::new`], posting to `path` instead of `/`
    pub fn with_path(
        endpoint: impl Into<String>,
        timeout: Duration,
        path: Option<&str>,
    ) -> McpResult<Self> {
        let endpoint = endpoint.into();
        let validation = EndpointValidator::validate(&endpoint);
        if validation.endpoint_type != EndpointType::ClusterService {
            return Err(McpError::validation(format!(
                "Cluster service endpoint must look like service.namespace{}[:port]: {}",
                CLUSTER_SUFFIX,
                validation
                    .error_message
                    .unwrap_or_else(|| format!("'{}' is not a cluster service", endpoint))
            ))
            .with_endpoint(&endpoint));
        }

        let path = path.unwrap_or("/");
        let separator = if path.starts_with('/') { "" } else { "/" };
        let raw = format!("http://{}{}{}", endpoint.trim(), separator, path);
        let url = Url::parse(&raw).map_err(|e| {
            McpError::validation(format!("Invalid cluster service URL '{}': {}", raw, e))
                .with_endpoint(&endpoint)
        })?;

        Ok(Self {
            endpoint,
            url,
            timeout,
            session: None,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl McpConnection for ClusterServiceConnection {
    async fn connect(&mut self) -> McpResult<()> {
        if self.session.is_some() {
            return Ok(());
        }
        // cluster URLs are always plain http
        self.session = Some(HttpSession::open(self.url.clone(), self.timeout, true)?);
        info!(endpoint = %self.endpoint, "Cluster service session opened");
        Ok(())
    }

    async fn send_message(&self, payload: Value) -> McpResult<Value> {
        let session = self.session.as_ref().ok_or_else(|| {
            McpError::connection(format!("Not connected to {}", self.endpoint))
                .with_endpoint(&self.endpoint)
        })?;
        session.post(&payload).await
    }

    async fn close(&mut self) -> McpResult<()> {
        if self.session.take().is_some() {
            info!(endpoint = %self.endpoint, "Cluster service session closed");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn connection_type(&self) -> ConnectionType {
        ConnectionType::ClusterService
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
