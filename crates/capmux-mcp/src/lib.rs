//! # Capmux MCP Library
//!
//! Capability-routed client over a set of MCP servers.
//!
//! This crate provides:
//! - Connection variants (external route, cluster service, mock)
//! - A bounded, health-tracked connection pool keyed by capability
//! - Keyword routing from free text to a capability
//! - The [`McpClient`] facade with single-step fallback
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         McpClient                               │
//! │   query(text) ──► CapabilityRouter ──► capability               │
//! │                                          │                      │
//! │                                          ▼                      │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │  ConnectionPool                                          │   │
//! │  │  "jira"   → ExternalRoute   (https://…)     healthy      │   │
//! │  │  "github" → ClusterService  (svc.ns…:8080)  unhealthy    │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │        target unhealthy or send failed                          │
//! │          └──► health_check ──► first healthy capability         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use capmux_mcp::{ClientOptions, McpClient};
//!
//! let client = McpClient::new(
//!     ClientOptions::default().with_source(r#"{"docs": "https://docs.example.com/mcp"}"#),
//! )?;
//! client.connect_all().await;
//!
//! let reply = client.query("search docs for rate limits", None).await?;
//! println!("{} answered: {}", reply.capability, reply.response);
//!
//! client.disconnect_all().await;
//! ```

pub mod client;
pub mod connection;
pub mod connection_pool;
pub mod routing;

pub use client::{ClientOptions, ConnectSummary, McpClient, QueryResponse, ServerStatus};
pub use connection::{
    ClusterServiceConnection, Connection, ConnectionFactory, ExternalRouteConnection,
    McpConnection, MockConnection,
};
pub use connection_pool::{ConnectionInfo, ConnectionPool, DEFAULT_MAX_CONNECTIONS};
pub use routing::{CapabilityRouter, KeywordRoute, DEFAULT_ROUTES};
