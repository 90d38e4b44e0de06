//! Shared test utilities and fixtures for Capmux integration tests.

pub use capmux_core::{
    ConfigManager, ConfigOptions, Configuration, ConnectionType, ErrorCategory, McpError,
    ServerConfig,
};
pub use capmux_mcp::{ClientOptions, ConnectionPool, McpClient};

use serde_json::{Map, Value};

/// Fixture builders
pub mod fixtures {
    use super::*;

    /// `MCP_SERVERS` source mapping each capability to a plain endpoint
    pub fn servers_source(servers: &[(&str, &str)]) -> String {
        let map: Map<String, Value> = servers
            .iter()
            .map(|(capability, endpoint)| (capability.to_string(), Value::from(*endpoint)))
            .collect();
        Value::Object(map).to_string()
    }

    /// Load `source` with default options
    pub fn load(source: &str) -> Configuration {
        ConfigManager::default()
            .load(Some(source))
            .expect("fixture configuration should load")
    }

    /// Client over `source` using mock connections
    pub fn mock_client(source: &str) -> McpClient {
        McpClient::new(ClientOptions::default().with_source(source).with_mock(true))
            .expect("fixture client should build")
    }
}

/// Tracing setup for tests
pub mod logging {
    use std::sync::Once;

    static INIT: Once = Once::new();

    /// Install a test writer subscriber once; honors `RUST_LOG`
    pub fn init() {
        INIT.call_once(|| {
            let filter = tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_test_writer()
                .try_init();
        });
    }
}
