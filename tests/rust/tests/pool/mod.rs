//! Connection pool integration tests
//!
//! Health transitions over mock connections and HTTP classification for
//! external routes against a local mock server.

mod external_route;
mod health;
