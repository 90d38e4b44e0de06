//! Client facade integration tests
//!
//! Routing, single-step fallback, status reporting and the health monitor.

mod fallback;
mod routing;
