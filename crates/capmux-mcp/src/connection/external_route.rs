//! Connection to a publicly routed HTTP(S) endpoint

use std::time::Duration;

use async_trait::async_trait;
use capmux_core::{ConnectionType, McpError, McpResult};
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use super::http::HttpSession;
use super::McpConnection;

/// Session against an ingress/gateway endpoint
pub struct ExternalRouteConnection {
    endpoint: String,
    url: Url,
    timeout: Duration,
    verify_tls: bool,
    session: Option<HttpSession>,
}

impl ExternalRouteConnection {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, verify_tls: bool) -> McpResult<Self> {
        let endpoint = endpoint.into();
        let url = Url::parse(&endpoint).map_err(|e| {
            McpError::validation(format!("Invalid external route '{}': {}", endpoint, e))
                .with_endpoint(&endpoint)
        })?;

        match url.scheme() {
            "https" => {}
            "http" => warn!(endpoint = %endpoint, "External route uses plain http, traffic is not encrypted"),
            other => {
                return Err(McpError::validation(format!(
                    "External route requires http or https scheme, got '{}'",
                    other
                ))
                .with_endpoint(&endpoint))
            }
        }

        if !verify_tls {
            warn!(endpoint = %endpoint, "TLS certificate verification disabled for external route");
        }

        Ok(Self {
            endpoint,
            url,
            timeout,
            verify_tls,
            session: None,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn verifies_tls(&self) -> bool {
        self.verify_tls
    }
}

#[async_trait]
impl McpConnection for ExternalRouteConnection {
    async fn connect(&mut self) -> McpResult<()> {
        if self.session.is_some() {
            return Ok(());
        }
        self.session = Some(HttpSession::open(
            self.url.clone(),
            self.timeout,
            self.verify_tls,
        )?);
        info!(endpoint = %self.endpoint, "External route session opened");
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
            info!(endpoint = %self.endpoint, "External route session closed");
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
        ConnectionType::ExternalRoute
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
