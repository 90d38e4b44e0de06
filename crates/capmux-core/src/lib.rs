//! # Capmux Core Library
//!
//! Configuration, validation and error handling for the capability-routed
//! MCP client.
//!
//! ## Modules
//!
//! - `config` - Multi-server configuration loading (`MCP_SERVERS`)
//! - `validation` - Endpoint grammar and security policy checks
//! - `error` - Categorized error taxonomy
//! - `error_handler` - Error normalization, failure counters, response envelopes

pub mod config;
pub mod error;
pub mod error_handler;
pub mod validation;

// Re-export commonly used types
pub use config::{
    ConfigManager, ConfigOptions, Configuration, ConnectionType, ServerConfig,
    DEFAULT_CAPABILITY, DEFAULT_ENDPOINT, MCP_SERVERS_ENV,
};
pub use error::{ErrorCategory, ErrorContext, McpError, McpResult};
pub use error_handler::{error_response, success_response, ErrorHandler};
pub use validation::{
    EndpointType, EndpointValidator, ParsedEndpoint, SecurityReport, SecurityValidator,
    ValidationResult,
};
