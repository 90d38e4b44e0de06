//! Error normalization and failure accounting
//!
//! [`ErrorHandler`] turns arbitrary failures from wrapped operations into
//! [`McpError`]s and keeps a bounded per-operation failure counter.

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::error::{ErrorContext, McpError, McpResult};

/// Default number of distinct operations tracked before eviction kicks in
pub const DEFAULT_MAX_TRACKED_OPERATIONS: usize = 1000;

struct CounterEntry {
    count: u64,
    first_seen: u64,
}

struct FailureCounter {
    entries: HashMap<String, CounterEntry>,
    next_seq: u64,
    cap: usize,
}

impl FailureCounter {
    fn record(&mut self, operation: &str) -> u64 {
        if !self.entries.contains_key(operation) && self.entries.len() >= self.cap {
            self.evict_oldest_half();
        }
        let seq = self.next_seq;
        let entry = self
            .entries
            .entry(operation.to_string())
            .or_insert_with(|| CounterEntry {
                count: 0,
                first_seen: seq,
            });
        if entry.first_seen == seq {
            self.next_seq += 1;
        }
        entry.count += 1;
        entry.count
    }

    /// Approximate cleanup: drop the older half by first insertion, not by recency
    fn evict_oldest_half(&mut self) {
        let mut by_age: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.first_seen, key.clone()))
            .collect();
        by_age.sort_unstable();
        let evict = by_age.len() / 2;
        for (_, key) in by_age.into_iter().take(evict) {
            self.entries.remove(&key);
        }
        warn!(evicted = evict, "Error counter reached capacity, evicted oldest entries");
    }
}

/// Normalizes errors and counts failures per operation
pub struct ErrorHandler {
    counter: Mutex<FailureCounter>,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_TRACKED_OPERATIONS)
    }

    /// Create a handler that tracks at most `cap` distinct operations
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            counter: Mutex::new(FailureCounter {
                entries: HashMap::new(),
                next_seq: 0,
                cap: cap.max(1),
            }),
        }
    }

    /// Run `operation`, normalizing any failure into an [`McpError`]
    ///
    /// Errors that already are an `McpError` pass through unchanged; anything
    /// else becomes [`crate::error::ErrorCategory::Unknown`] with the original kept as source.
    pub async fn wrap<T, F>(&self, context: ErrorContext, operation: F) -> McpResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match operation.await {
            Ok(value) => Ok(value),
            Err(err) => Err(self.handle(err, context)),
        }
    }

    /// Normalize and record a failure
    pub fn handle(&self, err: anyhow::Error, context: ErrorContext) -> McpError {
        let operation = context.operation.clone();
        let normalized = match err.downcast::<McpError>() {
            Ok(typed) => typed,
            Err(other) => McpError::unknown(format!("Unexpected error during {}: {}", operation, other))
                .with_context(context)
                .with_source(other),
        };
        self.record(&operation, &normalized);
        normalized
    }

    /// Count a failure against `operation` and log it
    pub fn record(&self, operation: &str, err: &McpError) -> u64 {
        let count = self.counter.lock().record(operation);
        let ctx = err.context();
        error!(
            operation = %operation,
            category = %err.category(),
            capability = ?ctx.capability,
            endpoint = ?ctx.endpoint,
            message_id = ?ctx.message_id,
            failures = count,
            "{}",
            err.message()
        );
        count
    }

    /// Snapshot of failure counts keyed by operation
    pub fn error_counts(&self) -> HashMap<String, u64> {
        self.counter
            .lock()
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.count))
            .collect()
    }

    pub fn reset(&self) {
        let mut counter = self.counter.lock();
        counter.entries.clear();
        counter.next_seq = 0;
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// `{"success": true, "data": ...}`
pub fn success_response(data: Value) -> Value {
    json!({
        "success": true,
        "data": data,
    })
}

/// `{"success": false, "error": {...}}` describing `err`
pub fn error_response(err: &McpError) -> Value {
    json!({
        "success": false,
        "error": {
            "message": err.message(),
            "category": err.category(),
            "context": err.context(),
        }
    })
}
