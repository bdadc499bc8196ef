//! Gateway election and default-route sync planning.
//!
//! The synchronizer periodically asks the routing engine for a path table
//! snapshot, elects the best mesh gate, and reconciles the kernel default
//! route. The decision logic lives here as pure functions; the async task
//! in the node layer only executes the returned plan.

use std::collections::HashMap;
use std::time::Instant;

use meshd_core::types::MacAddress;
use tracing::{debug, info};

use crate::path::MeshPath;

/// Do not switch gates unless the candidate is at least this factor better.
pub const GATEWAY_CHANGE_THRESHOLD_FACTOR: f64 = 2.0;

/// Elect the best gate from a path table snapshot.
///
/// The winner is the non-expired entry advertising the gate flag with the
/// lowest metric; ties break on the lower MAC address, so the choice is
/// stable under map iteration order.
#[must_use]
pub fn select_best_gate(
    paths: &HashMap<MacAddress, MeshPath>,
    now: Instant,
) -> Option<MeshPath> {
    paths
        .values()
        .filter(|p| p.is_gate && !p.is_expired(now))
        .min_by_key(|p| (p.metric, p.dst))
        .copied()
}

/// Whether a candidate gate is enough of an improvement to switch to.
#[must_use]
pub fn improves_on_current_gate(candidate_metric: u32, current_metric: u32) -> bool {
    (candidate_metric as f64) * GATEWAY_CHANGE_THRESHOLD_FACTOR <= current_metric as f64
}

/// One reconciliation step for the kernel default route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteSyncAction {
    /// Point the default route at `next_hop`, replacing any prior route.
    Install {
        gate: MacAddress,
        next_hop: MacAddress,
    },
    /// Remove the learned default route.
    Withdraw,
    /// Nothing to change.
    Keep,
}

/// Tracks the currently selected gate across sync rounds and plans route
/// changes with hysteresis.
#[derive(Debug, Default)]
pub struct RouteSyncPlanner {
    /// Selected gate: destination, metric it won with, and its next hop.
    current_gate: Option<(MacAddress, u32, MacAddress)>,
    was_gate: bool,
}

impl RouteSyncPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The gate the planner currently points the default route at.
    pub fn current_gate(&self) -> Option<MacAddress> {
        self.current_gate.map(|(gate, _, _)| gate)
    }

    /// Plan the next route reconciliation.
    ///
    /// `self_is_gate` is this node's own gateway status; a node that just
    /// became a gate withdraws any learned default route, since it is now
    /// the origin of one.
    pub fn plan(
        &mut self,
        paths: &HashMap<MacAddress, MeshPath>,
        self_is_gate: bool,
        now: Instant,
    ) -> RouteSyncAction {
        if self_is_gate {
            let became_gate = !self.was_gate;
            self.was_gate = true;
            if became_gate {
                info!("node became a gate; withdrawing learned default route");
                self.current_gate = None;
                return RouteSyncAction::Withdraw;
            }
            return RouteSyncAction::Keep;
        }
        self.was_gate = false;

        let candidate = select_best_gate(paths, now);

        // A stored gate that expired or stopped advertising no longer
        // constrains the choice.
        let current = self.current_gate.filter(|(gate, _, _)| {
            paths
                .get(gate)
                .is_some_and(|p| p.is_gate && !p.is_expired(now))
        });

        match (current, candidate) {
            (_, None) => {
                if self.current_gate.take().is_some() {
                    info!("no viable gate left; withdrawing default route");
                    return RouteSyncAction::Withdraw;
                }
                RouteSyncAction::Keep
            }
            (None, Some(cand)) => {
                info!(gate = %cand.dst, metric = cand.metric, "selected gate");
                self.current_gate = Some((cand.dst, cand.metric, cand.next_hop));
                RouteSyncAction::Install {
                    gate: cand.dst,
                    next_hop: cand.next_hop,
                }
            }
            (Some((gate, metric, next_hop)), Some(cand)) => {
                if cand.dst == gate {
                    // Same gate; keep the route unless its next hop moved.
                    self.current_gate = Some((cand.dst, cand.metric, cand.next_hop));
                    if cand.next_hop != next_hop {
                        info!(gate = %gate, next_hop = %cand.next_hop, "gate next hop changed");
                        return RouteSyncAction::Install {
                            gate: cand.dst,
                            next_hop: cand.next_hop,
                        };
                    }
                    return RouteSyncAction::Keep;
                }
                if improves_on_current_gate(cand.metric, metric) {
                    info!(
                        from = %gate,
                        to = %cand.dst,
                        metric = cand.metric,
                        "switching to better gate"
                    );
                    self.current_gate = Some((cand.dst, cand.metric, cand.next_hop));
                    return RouteSyncAction::Install {
                        gate: cand.dst,
                        next_hop: cand.next_hop,
                    };
                }
                debug!(
                    current = %gate,
                    candidate = %cand.dst,
                    "candidate gate not enough of an improvement"
                );
                RouteSyncAction::Keep
            }
        }
    }
}
