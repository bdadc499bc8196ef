//! Gateway connectivity monitor.
//!
//! Periodically probes upstream connectivity on the monitored interface
//! and drives this node's gateway role: while the probes succeed (and the
//! dampener has not suppressed a flapping uplink), the node advertises
//! itself as a mesh gate; when they fail, it withdraws. Entering the
//! active state counts as a flap, which is how gateway churn accumulates
//! dampening penalty.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use meshd_routing::dampener::{DampenerConfig, DampenerEvent, RouteDampener};
use meshd_routing::stats::StatsSink;

use crate::debugfs::DebugStatusWriter;
use crate::engine::RoutingHandle;
use crate::error::NodeError;
use crate::netlink::RootModeControl;
use crate::probe::{self, ProbeFailure};

/// Monitor parameters.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Upstream interface probes are bound to; empty skips device binding.
    pub interface: String,
    /// Probe targets, tried in configured order.
    pub addresses: Vec<std::net::SocketAddr>,
    /// Period of the probe loop.
    pub interval: Duration,
    /// Per-attempt connect timeout.
    pub socket_timeout: Duration,
    /// Probe attempts per tick before declaring connectivity lost.
    pub robustness: u32,
    /// Root-mode value to program while acting as gate; 0 disables.
    pub set_root_mode_if_gate: u8,
    /// Base directory of the rp_filter knobs.
    pub proc_conf_dir: PathBuf,
}

impl MonitorConfig {
    /// Production default for the rp_filter base directory.
    pub fn default_proc_conf_dir() -> PathBuf {
        PathBuf::from("/proc/sys/net/ipv4/conf")
    }
}

/// The gateway connectivity monitor task.
pub struct GatewayConnectivityMonitor {
    config: MonitorConfig,
    dampener: RouteDampener,
    routing: RoutingHandle,
    root_mode: Arc<dyn RootModeControl>,
    stats: Arc<dyn StatsSink>,
    debug: DebugStatusWriter,
    is_gateway_active: bool,
}

impl GatewayConnectivityMonitor {
    pub fn new(
        config: MonitorConfig,
        dampener_config: DampenerConfig,
        routing: RoutingHandle,
        root_mode: Arc<dyn RootModeControl>,
        stats: Arc<dyn StatsSink>,
        debug: DebugStatusWriter,
    ) -> Result<Self, NodeError> {
        let dampener = RouteDampener::new(dampener_config, Instant::now())?;
        Ok(Self {
            config,
            dampener,
            routing,
            root_mode,
            stats,
            debug,
            is_gateway_active: false,
        })
    }

    /// Run the probe loop until the stop signal fires.
    pub async fn run(mut self, mut stop_rx: watch::Receiver<bool>) {
        // One-time setup: keep rp_filter from eating probe replies.
        if let Err(e) =
            probe::disable_reverse_path_filter(&self.config.proc_conf_dir, &self.config.interface)
        {
            warn!(
                interface = %self.config.interface,
                error = %e,
                "failed to disable reverse-path filtering"
            );
        }

        let mut tick = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.interval,
            self.config.interval,
        );
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            interface = %self.config.interface,
            targets = self.config.addresses.len(),
            "gateway connectivity monitor running"
        );

        loop {
            tokio::select! {
                _ = tick.tick() => self.check_routes_and_advertise().await,
                _ = stop_rx.changed() => break,
            }
        }
        info!("gateway connectivity monitor stopped");
    }

    /// One monitor tick: probe, then reconcile the gateway role.
    pub async fn check_routes_and_advertise(&mut self) {
        let now = Instant::now();
        if let Some(DampenerEvent::Reused) = self.dampener.reuse_check(now) {
            self.stats.set_gauge("route_dampener.default_route_dampened", 0);
            self.undampen().await;
        }
        self.stats.set_gauge(
            "route_dampener.figure_of_merit",
            self.dampener.figure_of_merit(now) as i64,
        );

        if self.probe_wan_connectivity_robustly().await {
            if !self.dampener.is_suppressed() {
                self.debug.record("is_gateway", "true");
                self.advertise_default_route().await;
            } else {
                info!("default route dampened, not advertising");
            }
            if !self.is_gateway_active {
                // Becoming active is the flap; steady success adds nothing.
                if let Some(DampenerEvent::Suppressed) = self.dampener.flap(Instant::now()) {
                    self.stats.set_gauge("route_dampener.default_route_dampened", 1);
                    self.dampen().await;
                }
            }
            self.is_gateway_active = true;
        } else {
            self.debug.record("is_gateway", "false");
            self.withdraw_default_route().await;
            self.is_gateway_active = false;
        }
    }

    async fn probe_wan_connectivity_robustly(&self) -> bool {
        for _ in 0..self.config.robustness {
            if self.probe_wan_connectivity().await {
                return true;
            }
        }
        false
    }

    async fn probe_wan_connectivity(&self) -> bool {
        let interface =
            (!self.config.interface.is_empty()).then_some(self.config.interface.as_str());
        let mut last_failure = ProbeFailure::Unreachable;

        for addr in &self.config.addresses {
            match probe::probe_connect(interface, *addr, self.config.socket_timeout).await {
                Ok(()) => {
                    debug!(%addr, "probing WAN connectivity succeeded");
                    self.stats
                        .increment("gateway_monitor.probe_wan_connectivity.success");
                    return true;
                }
                Err(failure) => {
                    debug!(%addr, reason = failure.as_stat_key(), "probe attempt failed");
                    last_failure = failure;
                }
            }
        }

        // All attempts failed; report the failure mode of the last one.
        self.stats.increment(&format!(
            "gateway_monitor.probe_wan_connectivity.failed.{}",
            last_failure.as_stat_key()
        ));
        false
    }

    /// Dampener hook: the gateway role was suppressed.
    async fn dampen(&mut self) {
        if self.is_gateway_active {
            self.debug.record("is_gateway", "false");
            self.withdraw_default_route().await;
        }
    }

    /// Dampener hook: the gateway role is reusable again.
    async fn undampen(&mut self) {
        if self.is_gateway_active {
            self.debug.record("is_gateway", "true");
            self.advertise_default_route().await;
        }
    }

    async fn advertise_default_route(&mut self) {
        if self.config.set_root_mode_if_gate != 0 {
            if let Err(e) = self.root_mode.set_root_mode(self.config.set_root_mode_if_gate) {
                warn!(error = %e, "failed to set root mode");
                self.stats.increment("gateway_monitor.netlink_error");
            }
        }
        if self.routing.set_gateway_status(true).await.is_err() {
            warn!("routing engine gone; cannot advertise gateway status");
        }
    }

    async fn withdraw_default_route(&mut self) {
        if self.config.set_root_mode_if_gate != 0 {
            if let Err(e) = self.root_mode.set_root_mode(0) {
                warn!(error = %e, "failed to clear root mode");
                self.stats.increment("gateway_monitor.netlink_error");
            }
        }
        if self.routing.set_gateway_status(false).await.is_err() {
            warn!("routing engine gone; cannot withdraw gateway status");
        }
    }
}
