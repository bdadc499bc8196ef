//! Link metric source capability.
//!
//! The per-link airtime metric estimator is an external collaborator; the
//! routing engine only needs a snapshot view of peer MAC → link metric.

use std::collections::HashMap;
use std::sync::RwLock;

use meshd_core::types::MacAddress;

/// Snapshot view of link metrics toward direct neighbors.
pub trait MetricSource: Send + Sync {
    /// Metric of the link to `neighbor`, or `None` when the peer is
    /// unknown to the estimator.
    fn link_metric(&self, neighbor: MacAddress) -> Option<u32>;
}

/// A metric table fed by periodic snapshots from an external estimator.
///
/// An optional default metric answers for peers the table does not list;
/// without one, unknown peers have no metric and their frames are dropped.
#[derive(Debug, Default)]
pub struct StaticMetricTable {
    metrics: RwLock<HashMap<MacAddress, u32>>,
    default_metric: Option<u32>,
}

impl StaticMetricTable {
    pub fn new(default_metric: Option<u32>) -> Self {
        Self {
            metrics: RwLock::new(HashMap::new()),
            default_metric,
        }
    }

    /// Set the metric for one neighbor.
    pub fn set(&self, neighbor: MacAddress, metric: u32) {
        self.metrics
            .write()
            .expect("metric table lock poisoned")
            .insert(neighbor, metric);
    }

    /// Replace the whole table with a fresh snapshot.
    pub fn replace(&self, snapshot: HashMap<MacAddress, u32>) {
        *self.metrics.write().expect("metric table lock poisoned") = snapshot;
    }

    /// Forget one neighbor.
    pub fn remove(&self, neighbor: &MacAddress) {
        self.metrics
            .write()
            .expect("metric table lock poisoned")
            .remove(neighbor);
    }
}

impl MetricSource for StaticMetricTable {
    fn link_metric(&self, neighbor: MacAddress) -> Option<u32> {
        self.metrics
            .read()
            .expect("metric table lock poisoned")
            .get(&neighbor)
            .copied()
            .or(self.default_metric)
    }
}
