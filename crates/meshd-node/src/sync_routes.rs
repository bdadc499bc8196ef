//! Route synchronizer.
//!
//! Periodically elects the best mesh gate from the engine's path table
//! snapshot and reconciles the kernel default route: install when a gate
//! (with enough of a metric advantage) appears, withdraw when none is
//! viable or when this node itself becomes a gate. The election and
//! hysteresis rules live in `meshd_routing::gate`; this task only executes
//! the plan through the netlink seam.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use meshd_routing::gate::{RouteSyncAction, RouteSyncPlanner};
use meshd_routing::stats::StatsSink;

use crate::engine::RoutingHandle;
use crate::error::NodeError;
use crate::netlink::DefaultRouteControl;

/// The route synchronizer task.
pub struct RouteSynchronizer {
    routing: RoutingHandle,
    routes: Arc<dyn DefaultRouteControl>,
    stats: Arc<dyn StatsSink>,
    planner: RouteSyncPlanner,
    interval: Duration,
}

impl RouteSynchronizer {
    pub fn new(
        routing: RoutingHandle,
        routes: Arc<dyn DefaultRouteControl>,
        stats: Arc<dyn StatsSink>,
        interval: Duration,
    ) -> Self {
        Self {
            routing,
            routes,
            stats,
            planner: RouteSyncPlanner::new(),
            interval,
        }
    }

    /// Run the sync loop until the stop signal fires.
    pub async fn run(mut self, mut stop_rx: watch::Receiver<bool>) {
        let mut tick =
            tokio::time::interval_at(tokio::time::Instant::now() + self.interval, self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!("route synchronizer running");
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if self.sync_once().await.is_err() {
                        // Engine gone; nothing left to synchronize.
                        break;
                    }
                }
                _ = stop_rx.changed() => break,
            }
        }
        info!("route synchronizer stopped");
    }

    /// One reconciliation round.
    pub async fn sync_once(&mut self) -> Result<(), NodeError> {
        let paths = self.routing.dump_mpaths().await?;
        let self_is_gate = self.routing.get_gateway_status().await?;
        let now = tokio::time::Instant::now().into_std();

        match self.planner.plan(&paths, self_is_gate, now) {
            RouteSyncAction::Install { gate, next_hop } => {
                if let Err(e) = self.routes.install_default_route(next_hop) {
                    warn!(gate = %gate, error = %e, "failed to install default route");
                    self.stats.increment("route_sync.netlink_error");
                } else {
                    self.stats.increment("route_sync.route_installed");
                }
            }
            RouteSyncAction::Withdraw => {
                if let Err(e) = self.routes.withdraw_default_route() {
                    warn!(error = %e, "failed to withdraw default route");
                    self.stats.increment("route_sync.netlink_error");
                } else {
                    self.stats.increment("route_sync.route_withdrawn");
                }
            }
            RouteSyncAction::Keep => {}
        }
        Ok(())
    }

    /// The gate the default route currently points at.
    pub fn current_gate(&self) -> Option<meshd_core::types::MacAddress> {
        self.planner.current_gate()
    }
}
