//! Endpoint and configuration validation

pub mod endpoint;
pub mod security;

pub use endpoint::{
    ConfigurationValidation, EndpointType, EndpointValidator, ParsedEndpoint, ValidationResult,
    CLUSTER_SUFFIX,
};
pub use security::{is_private_host, SecurityReport, SecurityValidator};
