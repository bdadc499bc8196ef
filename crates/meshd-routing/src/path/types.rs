//! Mesh path entry type.

use std::time::{Duration, Instant};

use meshd_core::types::MacAddress;

/// A single entry in the mesh path table.
///
/// The destination address is the unique key; `next_hop` is the neighbor
/// frames for this destination are forwarded to. An entry whose `exp_time`
/// has passed is stale and must not be used for forwarding decisions.
#[derive(Debug, Clone, Copy)]
pub struct MeshPath {
    /// Path destination.
    pub dst: MacAddress,
    /// Neighbor chosen to forward toward `dst`.
    pub next_hop: MacAddress,
    /// Last sequence number observed from `dst`.
    pub sn: u64,
    /// Accumulated path metric; lower is better.
    pub metric: u32,
    /// Metric of the final hop, from this node to `next_hop`.
    pub next_hop_metric: u32,
    /// Hops to `dst`.
    pub hop_count: u8,
    /// When the path expires (or expired).
    pub exp_time: Instant,
    /// The destination advertises itself as a root node.
    pub is_root: bool,
    /// The destination advertises itself as a mesh gate.
    pub is_gate: bool,
}

impl MeshPath {
    /// Create a fresh entry for `dst` with zeroed fields, expiring at `now`.
    pub fn new(dst: MacAddress, now: Instant) -> Self {
        Self {
            dst,
            next_hop: MacAddress::new([0; 6]),
            sn: 0,
            metric: 0,
            next_hop_metric: 0,
            hop_count: 0,
            exp_time: now,
            is_root: false,
            is_gate: false,
        }
    }

    /// Whether the path is expired at the given time.
    ///
    /// Uses strict `>` comparison: `now > exp_time` means expired.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.exp_time
    }

    /// Time until the path expires, zero once it has.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.exp_time.saturating_duration_since(now)
    }
}
