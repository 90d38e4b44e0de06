//! JSON-over-HTTP session shared by the external-route and cluster-service
//! connections

use std::time::Duration;

use capmux_core::{McpError, McpResult};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;
use url::Url;

pub(crate) struct HttpSession {
    client: reqwest::Client,
    url: Url,
}

impl HttpSession {
    pub(crate) fn open(url: Url, timeout: Duration, verify_tls: bool) -> McpResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| {
                McpError::connection(format!("Failed to build HTTP client for {}: {}", url, e))
                    .with_endpoint(url.as_str())
                    .with_source(e)
            })?;
        Ok(Self { client, url })
    }

    /// POST `payload` and decode the JSON reply
    pub(crate) async fn post(&self, payload: &Value) -> McpResult<Value> {
        debug!(url = %self.url, "Sending message");

        let response = self
            .client
            .post(self.url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(McpError::authentication(format!(
                "Server at {} rejected the request: HTTP {}",
                self.url, status
            ))
            .with_endpoint(self.url.as_str()));
        }
        if !status.is_success() {
            return Err(McpError::protocol(format!(
                "Server at {} returned HTTP {}",
                self.url, status
            ))
            .with_endpoint(self.url.as_str()));
        }

        response.json::<Value>().await.map_err(|e| {
            McpError::protocol(format!("Invalid JSON response from {}: {}", self.url, e))
                .with_endpoint(self.url.as_str())
                .with_source(e)
        })
    }

    fn classify(&self, err: reqwest::Error) -> McpError {
        let base = if err.is_timeout() {
            McpError::timeout(format!("Request to {} timed out", self.url))
        } else {
            McpError::connection(format!("Request to {} failed: {}", self.url, err))
        };
        base.with_endpoint(self.url.as_str()).with_source(err)
    }
}
