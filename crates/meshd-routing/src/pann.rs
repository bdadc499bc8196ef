//! PANN routing state machine.
//!
//! [`RoutingState`] is the pure half of the routing engine: it consumes
//! decoded announcement frames and timer ticks, mutates the path table, and
//! returns transmit actions for the async engine loop to execute. Keeping
//! the decisions synchronous and `now`-parameterized makes every routing
//! path testable without timers or sockets.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use meshd_core::frame::PannFrame;
use meshd_core::types::MacAddress;
use tracing::debug;

use crate::error::ConfigError;
use crate::path::{MeshPath, PathTable};

/// Protocol parameters of the routing engine.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// This node's identity on the mesh.
    pub node_addr: MacAddress,
    /// Initial TTL for frames originated by this node.
    pub element_ttl: u8,
    /// Path expiry horizon; also the housekeeping period.
    pub active_path_timeout: Duration,
    /// Period of the root announcement timer.
    pub root_pann_interval: Duration,
    /// Announce as root regardless of gateway status.
    pub act_as_root: bool,
}

impl RoutingConfig {
    /// Check that the protocol parameters are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.element_ttl == 0 {
            return Err(ConfigError::ZeroElementTtl);
        }
        Ok(())
    }
}

/// An egress action produced by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PannAction {
    /// Transmit `frame` to the link-layer destination `da`.
    Transmit { da: MacAddress, frame: PannFrame },
}

/// Disposition of one ingress frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PannOutcome {
    /// The frame updated the path table.
    Accepted,
    /// The frame carried our own address as originator.
    SelfOriginated,
    /// No link metric is known for the transmitter.
    UnknownPeer,
    /// Sequence number regression, or no metric improvement at equal sn.
    Stale,
}

/// The routing engine's mutable state: path table, local sequence number,
/// and the root/gate flags stamped into originated announcements.
pub struct RoutingState {
    config: RoutingConfig,
    paths: PathTable,
    /// Local mesh sequence number.
    sn: u64,
    is_root: bool,
    is_gate: bool,
}

impl RoutingState {
    pub fn new(config: RoutingConfig) -> Self {
        let is_root = config.act_as_root;
        Self {
            config,
            paths: PathTable::new(),
            sn: 0,
            is_root,
            is_gate: false,
        }
    }

    pub fn node_addr(&self) -> MacAddress {
        self.config.node_addr
    }

    pub fn gateway_status(&self) -> bool {
        self.is_gate
    }

    /// Mark this node as a mesh gate.
    ///
    /// A gate announces itself proactively, so the root announcement timer
    /// follows the gate flag unless the node is configured to always act
    /// as root.
    pub fn set_gateway_status(&mut self, is_gate: bool) {
        self.is_gate = is_gate;
        self.is_root = is_gate || self.config.act_as_root;
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Process one decoded announcement received from neighbor `sa`.
    ///
    /// `link_metric` is the metric of the link to `sa`, or `None` when the
    /// metric source does not know the peer.
    pub fn handle_frame(
        &mut self,
        sa: MacAddress,
        frame: &PannFrame,
        link_metric: Option<u32>,
        now: Instant,
    ) -> (PannOutcome, Vec<PannAction>) {
        // Never process our own announcements echoed back by peers.
        if frame.orig_addr == self.config.node_addr {
            return (PannOutcome::SelfOriginated, Vec::new());
        }

        let link_metric = match link_metric {
            Some(m) => m,
            None => {
                debug!(sa = %sa, "dropping announcement from peer with no link metric");
                return (PannOutcome::UnknownPeer, Vec::new());
            }
        };

        let new_metric = frame.metric.saturating_add(link_metric);

        let path = self.paths.get_or_insert(frame.orig_addr, now);
        let accept = frame.orig_sn > path.sn
            || (frame.orig_sn == path.sn && new_metric < path.metric);
        if !accept {
            return (PannOutcome::Stale, Vec::new());
        }

        path.sn = frame.orig_sn;
        path.metric = new_metric;
        path.next_hop = sa;
        path.next_hop_metric = link_metric;
        path.hop_count = frame.hop_count.saturating_add(1);
        path.exp_time = now + self.config.active_path_timeout;
        path.is_gate = frame.is_gate;
        // Only the origin itself advertises the root flag; a forwarded
        // announcement says nothing about it.
        if frame.hop_count == 0 {
            path.is_root = true;
        }

        let mut actions = Vec::new();

        if frame.ttl > 1 {
            actions.push(PannAction::Transmit {
                da: MacAddress::BROADCAST,
                frame: PannFrame {
                    orig_addr: frame.orig_addr,
                    orig_sn: frame.orig_sn,
                    hop_count: frame.hop_count.saturating_add(1),
                    ttl: frame.ttl - 1,
                    target_addr: frame.target_addr,
                    metric: new_metric,
                    is_gate: frame.is_gate,
                    reply_requested: frame.reply_requested,
                },
            });
        }

        if frame.reply_requested && frame.target_addr == self.config.node_addr {
            self.sn += 1;
            actions.push(PannAction::Transmit {
                da: sa,
                frame: PannFrame {
                    orig_addr: self.config.node_addr,
                    orig_sn: self.sn,
                    hop_count: 0,
                    ttl: self.config.element_ttl,
                    target_addr: frame.orig_addr,
                    metric: 0,
                    is_gate: self.is_gate,
                    reply_requested: false,
                },
            });
        }

        (PannOutcome::Accepted, actions)
    }

    /// Housekeeping tick: evict expired paths. Emits no frames.
    pub fn housekeeping(&mut self, now: Instant) -> Vec<MacAddress> {
        let evicted = self.paths.expire(now);
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "expired mesh paths");
        }
        evicted
    }

    /// Root announcement tick: originate a broadcast PANN if this node is
    /// currently a root.
    pub fn root_announce(&mut self) -> Option<PannAction> {
        if !self.is_root {
            return None;
        }
        self.sn += 1;
        Some(PannAction::Transmit {
            da: MacAddress::BROADCAST,
            frame: PannFrame {
                orig_addr: self.config.node_addr,
                orig_sn: self.sn,
                hop_count: 0,
                ttl: self.config.element_ttl,
                target_addr: MacAddress::BROADCAST,
                metric: 0,
                is_gate: self.is_gate,
                reply_requested: false,
            },
        })
    }

    /// By-value snapshot of the path table.
    #[must_use]
    pub fn dump_mpaths(&self) -> HashMap<MacAddress, MeshPath> {
        self.paths.snapshot()
    }

    /// Borrow the path table (test and introspection support).
    pub fn paths(&self) -> &PathTable {
        &self.paths
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn node_addr() -> MacAddress {
        MacAddress::new([0xaa, 0, 0, 0, 0, 0x01])
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        /// With strictly increasing sequence numbers from one origin, the
        /// table tracks the maximum sn seen and the accumulated metric of
        /// the latest acceptance, and every acceptance refreshes expiry.
        #[test]
        fn increasing_sn_always_accepted(
            deltas in proptest::collection::vec((1..5u64, 0..1000u32, 1..1000u32), 1..32),
        ) {
            let mut state = RoutingState::new(RoutingConfig {
                node_addr: node_addr(),
                element_ttl: 31,
                active_path_timeout: Duration::from_secs(10),
                root_pann_interval: Duration::from_secs(5),
                act_as_root: false,
            });
            let now = Instant::now();
            let bb = MacAddress::new([0xbb, 0, 0, 0, 0, 0x02]);

            let mut sn = 0u64;
            let mut last = (0u64, 0u32);
            for (delta, metric, link) in deltas {
                sn += delta;
                let frame = PannFrame {
                    orig_addr: bb,
                    orig_sn: sn,
                    hop_count: 0,
                    ttl: 31,
                    target_addr: MacAddress::BROADCAST,
                    metric,
                    is_gate: false,
                    reply_requested: false,
                };
                let (outcome, _) = state.handle_frame(bb, &frame, Some(link), now);
                prop_assert_eq!(outcome, PannOutcome::Accepted);
                last = (sn, metric + link);

                let path = state.paths().lookup(&bb).unwrap();
                prop_assert!(!path.is_expired(now), "expiry must be refreshed on acceptance");
            }

            let path = state.paths().lookup(&bb).unwrap();
            prop_assert_eq!(path.sn, last.0);
            prop_assert_eq!(path.metric, last.1);
        }
    }
}
