//! String-keyed stats sink capability.
//!
//! Counters and gauges are pushed to an external stats collector in
//! production; the sink is injected so tests can assert on increments.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

/// Sink for string-keyed counters and gauges.
pub trait StatsSink: Send + Sync {
    /// Add one to the counter at `key`.
    fn increment(&self, key: &str);

    /// Set the gauge at `key`.
    fn set_gauge(&self, key: &str, value: i64);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStats;

impl StatsSink for NoopStats {
    fn increment(&self, _key: &str) {}
    fn set_gauge(&self, _key: &str, _value: i64) {}
}

/// Sink that logs values at debug level; the default for a daemon running
/// without a stats collector.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStats;

impl StatsSink for LogStats {
    fn increment(&self, key: &str) {
        debug!(key, "stat increment");
    }

    fn set_gauge(&self, key: &str, value: i64) {
        debug!(key, value, "stat gauge");
    }
}

/// In-memory sink for test assertions.
#[derive(Debug, Default)]
pub struct MemoryStats {
    counters: Mutex<HashMap<String, u64>>,
    gauges: Mutex<HashMap<String, i64>>,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter; zero if never incremented.
    pub fn counter(&self, key: &str) -> u64 {
        self.counters
            .lock()
            .expect("stats lock poisoned")
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Current value of a gauge.
    pub fn gauge(&self, key: &str) -> Option<i64> {
        self.gauges
            .lock()
            .expect("stats lock poisoned")
            .get(key)
            .copied()
    }
}

impl StatsSink for MemoryStats {
    fn increment(&self, key: &str) {
        *self
            .counters
            .lock()
            .expect("stats lock poisoned")
            .entry(key.to_string())
            .or_insert(0) += 1;
    }

    fn set_gauge(&self, key: &str, value: i64) {
        self.gauges
            .lock()
            .expect("stats lock poisoned")
            .insert(key.to_string(), value);
    }
}
