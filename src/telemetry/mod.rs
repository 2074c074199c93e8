//! Call metrics collection.
//!
//! The transport reports `(url, elapsed, success)` after every attempt,
//! retried or not. Applications plug in their own sink; the default is a
//! no-op.

use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

pub trait MetricsSink: Send + Sync {
    fn record_call(&self, url: &str, elapsed: Duration, success: bool);
}

/// Default sink that discards everything.
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_call(&self, _url: &str, _elapsed: Duration, _success: bool) {}
}

pub fn noop_sink() -> Arc<dyn MetricsSink> {
    Arc::new(NoopMetrics)
}

/// Sink that logs each attempt through `tracing`.
pub struct LogMetrics;

impl MetricsSink for LogMetrics {
    fn record_call(&self, url: &str, elapsed: Duration, success: bool) {
        debug!(url, elapsed_ms = elapsed.as_millis() as u64, success, "api call");
    }
}

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub url: String,
    pub elapsed: Duration,
    pub success: bool,
}

/// In-memory sink for tests and diagnostics.
#[derive(Default)]
pub struct InMemoryMetrics {
    calls: RwLock<Vec<CallRecord>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record_call(&self, url: &str, elapsed: Duration, success: bool) {
        self.calls.write().unwrap().push(CallRecord {
            url: url.to_string(),
            elapsed,
            success,
        });
    }
}
