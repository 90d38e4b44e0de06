//! Connection Pool
//!
//! Bounded map of capability → live connection with a health flag.
//!
//! Locking:
//! - The entry map and in-flight reservations sit behind one short-lived
//!   `parking_lot::Mutex` that is never held across an `.await`
//! - Each connection sits behind its own `tokio::sync::RwLock`: sends on one
//!   capability share the read side, `close` takes the write side
//! - Health is an `AtomicBool` per entry, so snapshots never wait on I/O
//!
//! Capacity counts live entries plus reservations, so concurrent
//! `add_connection` calls cannot push the pool past its maximum.
//!
//! Every entry carries a `CancellationToken`. Closing an entry cancels it
//! first, so in-flight sends and pings fail with a connection error instead
//! of holding the read side until they time out.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use capmux_core::{ConnectionType, McpError, McpResult, ServerConfig};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::{Connection, ConnectionFactory, McpConnection, MockConnection};

/// Default maximum number of pooled connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 50;

/// Send timeout used by `add_connection` when no server config is supplied
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
struct PoolEntry {
    connection: Arc<RwLock<Connection>>,
    healthy: Arc<AtomicBool>,
    shutdown: CancellationToken,
    endpoint: String,
    connection_type: ConnectionType,
    connected_at: DateTime<Utc>,
}

#[derive(Default)]
struct PoolState {
    entries: HashMap<String, PoolEntry>,
    pending: HashSet<String>,
    last_errors: HashMap<String, String>,
    /// Bumped by `close_all`; connects reserved under an older generation are discarded
    generation: u64,
}

/// Read-only view of one pooled connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub endpoint: String,
    pub connection_type: ConnectionType,
    pub connected: bool,
    pub healthy: bool,
    pub connected_at: DateTime<Utc>,
}

/// Bounded pool of connections keyed by capability
pub struct ConnectionPool {
    state: Mutex<PoolState>,
    max_connections: usize,
    default_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(max_connections: usize) -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
            max_connections,
            default_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Timeout applied to connections built by [`ConnectionPool::add_connection`]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Connect `capability` to `endpoint`
    ///
    /// Returns `false` instead of failing when the pool is full or the
    /// connection cannot be established; the failure is logged and kept for
    /// [`ConnectionPool::last_error`].
    pub async fn add_connection(
        &self,
        capability: &str,
        endpoint: &str,
        connection_type: Option<ConnectionType>,
        use_mock: bool,
    ) -> bool {
        let timeout = self.default_timeout;
        self.establish(capability, || {
            if use_mock {
                Ok(Connection::Mock(MockConnection::new(endpoint, timeout)))
            } else {
                ConnectionFactory::create(endpoint, connection_type, timeout)
            }
        })
        .await
    }

    /// Connect a configured server, honoring its timeout and metadata
    pub async fn add_server(&self, server: &ServerConfig, use_mock: bool) -> bool {
        self.establish(&server.capability, || {
            ConnectionFactory::from_server(server, use_mock)
        })
        .await
    }

    /// Pool an already built connection, connecting it first
    pub async fn insert_connection(&self, capability: &str, connection: Connection) -> bool {
        self.establish(capability, move || Ok(connection)).await
    }

    async fn establish<F>(&self, capability: &str, build: F) -> bool
    where
        F: FnOnce() -> McpResult<Connection>,
    {
        let generation = {
            let mut state = self.state.lock();
            if let Some(entry) = state.entries.get(capability) {
                debug!(capability = %capability, "Capability already pooled");
                return entry.healthy.load(Ordering::SeqCst);
            }
            if state.pending.contains(capability) {
                debug!(capability = %capability, "Connection already in progress");
                return false;
            }
            if state.entries.len() + state.pending.len() >= self.max_connections {
                warn!(
                    capability = %capability,
                    max_connections = self.max_connections,
                    "Connection pool is full, rejecting connection"
                );
                return false;
            }
            state.pending.insert(capability.to_string());
            state.generation
        };

        let result = match build() {
            Ok(mut connection) => match connection.connect().await {
                Ok(()) => Ok(connection),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        let stale = {
            let mut state = self.state.lock();
            state.pending.remove(capability);

            match result {
                Ok(connection) if state.generation == generation => {
                    let entry = PoolEntry {
                        endpoint: connection.endpoint().to_string(),
                        connection_type: connection.connection_type(),
                        connection: Arc::new(RwLock::new(connection)),
                        healthy: Arc::new(AtomicBool::new(true)),
                        shutdown: CancellationToken::new(),
                        connected_at: Utc::now(),
                    };
                    info!(
                        capability = %capability,
                        endpoint = %entry.endpoint,
                        connection_type = %entry.connection_type,
                        "Connection established"
                    );
                    state.last_errors.remove(capability);
                    state.entries.insert(capability.to_string(), entry);
                    return true;
                }
                Ok(connection) => connection,
                Err(e) => {
                    error!(
                        capability = %capability,
                        category = %e.category(),
                        error = %e,
                        "Failed to establish connection"
                    );
                    state.last_errors.insert(capability.to_string(), e.to_string());
                    return false;
                }
            }
        };

        debug!(capability = %capability, "Pool closed while connecting, discarding connection");
        let mut stale = stale;
        if let Err(e) = stale.close().await {
            warn!(capability = %capability, error = %e, "Failed to close discarded connection");
        }
        false
    }

    fn entry(&self, capability: &str) -> Option<PoolEntry> {
        self.state.lock().entries.get(capability).cloned()
    }

    /// Send `payload` to `capability`
    ///
    /// A failed send marks the capability unhealthy and returns the error.
    pub async fn send_message(&self, capability: &str, payload: Value) -> McpResult<Value> {
        let entry = self.entry(capability).ok_or_else(|| {
            McpError::connection(format!("Capability '{}' not found in pool", capability))
                .in_operation("send_message")
                .with_capability(capability)
        })?;

        if !entry.healthy.load(Ordering::SeqCst) {
            return Err(McpError::connection(format!(
                "Capability '{}' is marked unhealthy",
                capability
            ))
            .in_operation("send_message")
            .with_capability(capability)
            .with_endpoint(&entry.endpoint));
        }

        let result = tokio::select! {
            biased;
            _ = entry.shutdown.cancelled() => return Err(closed_error(capability, &entry.endpoint)),
            result = async { entry.connection.read().await.send_message(payload).await } => result,
        };
        result.map_err(|e| {
            if entry.healthy.swap(false, Ordering::SeqCst) {
                warn!(capability = %capability, error = %e, "Send failed, capability marked unhealthy");
            }
            e.with_capability(capability)
        })
    }

    /// Ping every pooled connection and refresh the health map
    ///
    /// A failed ping marks the capability unhealthy but keeps it pooled; a
    /// successful one marks it healthy again.
    pub async fn health_check(&self) -> HashMap<String, bool> {
        let entries: Vec<(String, PoolEntry)> = self
            .state
            .lock()
            .entries
            .iter()
            .map(|(capability, entry)| (capability.clone(), entry.clone()))
            .collect();

        let checks = entries.into_iter().map(|(capability, entry)| async move {
            let message = json!({ "jsonrpc": "2.0", "method": "ping" });
            let ping = async { entry.connection.read().await.send_message(message).await };
            let result = tokio::select! {
                biased;
                _ = entry.shutdown.cancelled() => {
                    debug!(capability = %capability, "Connection closed during health check");
                    return (capability, false);
                }
                result = ping => result,
            };
            let healthy = match result {
                Ok(_) => true,
                Err(e) => {
                    debug!(capability = %capability, error = %e, "Health check ping failed");
                    false
                }
            };
            let previous = entry.healthy.swap(healthy, Ordering::SeqCst);
            if previous != healthy {
                info!(capability = %capability, healthy, "Capability health changed");
            }
            (capability, healthy)
        });

        join_all(checks).await.into_iter().collect()
    }

    /// Close and remove one capability; returns whether it was pooled
    pub async fn close_connection(&self, capability: &str) -> bool {
        let removed = {
            let mut state = self.state.lock();
            state.last_errors.remove(capability);
            state.entries.remove(capability)
        };
        match removed {
            Some(entry) => {
                entry.shutdown.cancel();
                if let Err(e) = entry.connection.write().await.close().await {
                    warn!(capability = %capability, error = %e, "Failed to close connection");
                }
                true
            }
            None => false,
        }
    }

    /// Close every connection and clear all pool state
    ///
    /// Individual close failures are logged and skipped.
    pub async fn close_all(&self) {
        let entries: Vec<(String, PoolEntry)> = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.last_errors.clear();
            state.entries.drain().collect()
        };
        for (_, entry) in &entries {
            entry.shutdown.cancel();
        }

        let count = entries.len();
        for (capability, entry) in entries {
            if let Err(e) = entry.connection.write().await.close().await {
                warn!(capability = %capability, error = %e, "Failed to close connection");
            }
        }
        info!(closed = count, "Closed all pooled connections");
    }

    pub async fn get_connection_info(&self) -> BTreeMap<String, ConnectionInfo> {
        let entries: Vec<(String, PoolEntry)> = self
            .state
            .lock()
            .entries
            .iter()
            .map(|(capability, entry)| (capability.clone(), entry.clone()))
            .collect();

        let mut info = BTreeMap::new();
        for (capability, entry) in entries {
            let connected = entry.connection.read().await.is_connected();
            info.insert(
                capability,
                ConnectionInfo {
                    endpoint: entry.endpoint,
                    connection_type: entry.connection_type,
                    connected,
                    healthy: entry.healthy.load(Ordering::SeqCst),
                    connected_at: entry.connected_at,
                },
            );
        }
        info
    }

    pub fn get_health_status(&self) -> BTreeMap<String, bool> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|(capability, entry)| (capability.clone(), entry.healthy.load(Ordering::SeqCst)))
            .collect()
    }

    /// Pooled and currently marked healthy
    pub fn is_healthy(&self, capability: &str) -> bool {
        self.state
            .lock()
            .entries
            .get(capability)
            .is_some_and(|entry| entry.healthy.load(Ordering::SeqCst))
    }

    pub fn contains(&self, capability: &str) -> bool {
        self.state.lock().entries.contains_key(capability)
    }

    /// Last connect failure recorded for `capability`
    pub fn last_error(&self, capability: &str) -> Option<String> {
        self.state.lock().last_errors.get(capability).cloned()
    }

    pub fn capabilities(&self) -> Vec<String> {
        self.state.lock().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}

fn closed_error(capability: &str, endpoint: &str) -> McpError {
    McpError::connection(format!("Connection for '{}' was closed", capability))
        .in_operation("send_message")
        .with_capability(capability)
        .with_endpoint(endpoint)
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONNECTIONS)
    }
}
