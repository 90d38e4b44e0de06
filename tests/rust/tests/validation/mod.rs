//! Validation integration tests
//!
//! Endpoint classification and the security policy.

mod endpoint;
mod security;
