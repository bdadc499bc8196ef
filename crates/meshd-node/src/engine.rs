//! Routing engine actor.
//!
//! The engine task exclusively owns the routing state: every ingress frame,
//! timer tick, and control request is marshalled onto its loop through a
//! command channel, so mutations of the path table are serialized and an
//! ingress packet can never interleave with a housekeeping tick. Callers
//! hold a cloneable [`RoutingHandle`] and await replies over oneshot
//! channels; when the engine stops, outstanding requests fail with
//! [`NodeError::EngineStopped`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use meshd_core::frame::PannFrame;
use meshd_core::types::MacAddress;
use meshd_routing::metrics::MetricSource;
use meshd_routing::pann::{PannAction, PannOutcome, RoutingConfig, RoutingState};
use meshd_routing::path::MeshPath;
use meshd_routing::stats::StatsSink;

use crate::error::NodeError;

/// Egress callback: link-layer destination and encoded frame bytes.
pub type SendPacketFn = Box<dyn Fn(MacAddress, Vec<u8>) + Send>;

enum EngineCommand {
    ReceivePacket {
        sa: MacAddress,
        data: Vec<u8>,
    },
    SetSendPacketCallback(SendPacketFn),
    ResetSendPacketCallback,
    SetGatewayStatus(bool),
    GetGatewayStatus {
        reply: oneshot::Sender<bool>,
    },
    DumpMpaths {
        reply: oneshot::Sender<HashMap<MacAddress, MeshPath>>,
    },
}

/// Cloneable handle marshalling requests onto the engine loop.
#[derive(Clone)]
pub struct RoutingHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl RoutingHandle {
    /// Ingress path: decode and process a frame received from `sa`.
    pub async fn receive_packet(&self, sa: MacAddress, data: Vec<u8>) -> Result<(), NodeError> {
        self.send(EngineCommand::ReceivePacket { sa, data }).await
    }

    /// Install the egress callback.
    pub async fn set_send_packet_callback(&self, cb: SendPacketFn) -> Result<(), NodeError> {
        self.send(EngineCommand::SetSendPacketCallback(cb)).await
    }

    /// Clear the egress callback; frames to emit are dropped from then on.
    pub async fn reset_send_packet_callback(&self) -> Result<(), NodeError> {
        self.send(EngineCommand::ResetSendPacketCallback).await
    }

    /// Mark this node as a mesh gate (or not).
    pub async fn set_gateway_status(&self, is_gate: bool) -> Result<(), NodeError> {
        self.send(EngineCommand::SetGatewayStatus(is_gate)).await
    }

    pub async fn get_gateway_status(&self) -> Result<bool, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::GetGatewayStatus { reply }).await?;
        rx.await.map_err(|_| NodeError::EngineStopped)
    }

    /// By-value snapshot of the path table.
    pub async fn dump_mpaths(&self) -> Result<HashMap<MacAddress, MeshPath>, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::DumpMpaths { reply }).await?;
        rx.await.map_err(|_| NodeError::EngineStopped)
    }

    async fn send(&self, cmd: EngineCommand) -> Result<(), NodeError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| NodeError::EngineStopped)
    }
}

/// The routing engine task state.
pub struct RoutingEngine {
    state: RoutingState,
    send_packet: Option<SendPacketFn>,
    metrics: Arc<dyn MetricSource>,
    stats: Arc<dyn StatsSink>,
}

impl RoutingEngine {
    /// Arm the engine's timers and spawn its task.
    pub fn spawn(
        config: RoutingConfig,
        metrics: Arc<dyn MetricSource>,
        stats: Arc<dyn StatsSink>,
        stop_rx: watch::Receiver<bool>,
    ) -> (RoutingHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(256);
        let engine = RoutingEngine {
            state: RoutingState::new(config.clone()),
            send_packet: None,
            metrics,
            stats,
        };
        let handle = tokio::spawn(engine.run(config, rx, stop_rx));
        (RoutingHandle { tx }, handle)
    }

    async fn run(
        mut self,
        config: RoutingConfig,
        mut rx: mpsc::Receiver<EngineCommand>,
        mut stop_rx: watch::Receiver<bool>,
    ) {
        let start = tokio::time::Instant::now();
        let mut housekeeping = tokio::time::interval_at(
            start + config.active_path_timeout,
            config.active_path_timeout,
        );
        housekeeping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut root_announce = tokio::time::interval_at(
            start + config.root_pann_interval,
            config.root_pann_interval,
        );
        root_announce.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(node = %self.state.node_addr(), "routing engine running");

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                _ = housekeeping.tick() => {
                    self.state.housekeeping(now());
                }
                _ = root_announce.tick() => {
                    if let Some(action) = self.state.root_announce() {
                        self.execute(action);
                    }
                }
                _ = stop_rx.changed() => break,
            }
        }

        // Drain already-posted requests so their futures resolve, then
        // drop the receiver; senders see the engine as stopped.
        while let Ok(cmd) = rx.try_recv() {
            self.handle_command(cmd);
        }
        rx.close();
        self.send_packet = None;
        info!("routing engine stopped");
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::ReceivePacket { sa, data } => self.receive_packet(sa, &data),
            EngineCommand::SetSendPacketCallback(cb) => {
                self.send_packet = Some(cb);
            }
            EngineCommand::ResetSendPacketCallback => {
                self.send_packet = None;
            }
            EngineCommand::SetGatewayStatus(is_gate) => {
                if self.state.gateway_status() != is_gate {
                    info!(is_gate, "gateway status changed");
                }
                self.state.set_gateway_status(is_gate);
            }
            EngineCommand::GetGatewayStatus { reply } => {
                let _ = reply.send(self.state.gateway_status());
            }
            EngineCommand::DumpMpaths { reply } => {
                let _ = reply.send(self.state.dump_mpaths());
            }
        }
    }

    fn receive_packet(&mut self, sa: MacAddress, data: &[u8]) {
        let frame = match PannFrame::parse(data) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(sa = %sa, error = %e, "dropping malformed frame");
                self.stats.increment("routing.malformed_frame");
                return;
            }
        };

        let link_metric = self.metrics.link_metric(sa);
        let (outcome, actions) = self.state.handle_frame(sa, &frame, link_metric, now());
        match outcome {
            PannOutcome::Accepted => {
                trace!(orig = %frame.orig_addr, sn = frame.orig_sn, "announcement accepted");
            }
            PannOutcome::SelfOriginated => {
                self.stats.increment("routing.self_originated_frame");
            }
            PannOutcome::UnknownPeer => {
                self.stats.increment("routing.unknown_peer");
            }
            PannOutcome::Stale => {
                self.stats.increment("routing.stale_announcement");
            }
        }

        for action in actions {
            self.execute(action);
        }
    }

    fn execute(&mut self, action: PannAction) {
        let PannAction::Transmit { da, frame } = action;
        match &self.send_packet {
            Some(cb) => cb(da, frame.serialize()),
            None => {
                debug!(da = %da, "no egress callback installed; dropping frame");
                self.stats.increment("routing.tx_dropped_no_callback");
            }
        }
    }
}

/// Current time for routing state calls.
///
/// Goes through the tokio clock so paused-time tests control expiry.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// An introspection row describing one mesh path.
#[derive(Debug, Clone, Serialize)]
pub struct PathInfo {
    pub dst: String,
    pub next_hop: String,
    pub sn: u64,
    pub metric: u32,
    pub next_hop_metric: u32,
    pub hop_count: u8,
    pub exp_time_remaining_ms: u64,
    pub is_root: bool,
    pub is_gate: bool,
}

impl PathInfo {
    pub fn from_path(path: &MeshPath, now: Instant) -> Self {
        Self {
            dst: path.dst.to_string(),
            next_hop: path.next_hop.to_string(),
            sn: path.sn,
            metric: path.metric,
            next_hop_metric: path.next_hop_metric,
            hop_count: path.hop_count,
            exp_time_remaining_ms: path.remaining(now).as_millis() as u64,
            is_root: path.is_root,
            is_gate: path.is_gate,
        }
    }
}

/// Render a path table snapshot as introspection rows, ordered by
/// destination for stable output.
pub fn dump_path_info(paths: &HashMap<MacAddress, MeshPath>, now: Instant) -> Vec<PathInfo> {
    let mut rows: Vec<&MeshPath> = paths.values().collect();
    rows.sort_by_key(|p| p.dst);
    rows.into_iter().map(|p| PathInfo::from_path(p, now)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn path_info_reports_remaining_ttl() {
        let now = Instant::now();
        let mut path = MeshPath::new(MacAddress::new([0xbb, 0, 0, 0, 0, 2]), now);
        path.next_hop = MacAddress::new([0xcc, 0, 0, 0, 0, 3]);
        path.sn = 9;
        path.metric = 120;
        path.exp_time = now + Duration::from_secs(4);

        let info = PathInfo::from_path(&path, now);
        assert_eq!(info.dst, "bb:00:00:00:00:02");
        assert_eq!(info.next_hop, "cc:00:00:00:00:03");
        assert_eq!(info.exp_time_remaining_ms, 4000);

        // Already-expired paths clamp to zero.
        let info = PathInfo::from_path(&path, now + Duration::from_secs(10));
        assert_eq!(info.exp_time_remaining_ms, 0);
    }

    #[test]
    fn dump_path_info_is_ordered_and_serializable() {
        let now = Instant::now();
        let mut paths = HashMap::new();
        for seed in [9u8, 2, 5] {
            let dst = MacAddress::new([seed, 0, 0, 0, 0, seed]);
            paths.insert(dst, MeshPath::new(dst, now));
        }

        let rows = dump_path_info(&paths, now);
        let dsts: Vec<&str> = rows.iter().map(|r| r.dst.as_str()).collect();
        assert_eq!(
            dsts,
            vec![
                "02:00:00:00:00:02",
                "05:00:00:00:00:05",
                "09:00:00:00:00:09"
            ]
        );

        let json = serde_json::to_string(&rows).unwrap();
        assert!(json.contains("\"dst\":\"02:00:00:00:00:02\""));
    }
}
