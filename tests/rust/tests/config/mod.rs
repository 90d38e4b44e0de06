//! Configuration integration tests
//!
//! Source parsing, environment options and the deployment round-trip.

mod options;
