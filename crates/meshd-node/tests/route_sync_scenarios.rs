//! Route synchronizer scenarios: gate election end-to-end from received
//! announcements down to the netlink seam.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;

use meshd_core::frame::PannFrame;
use meshd_core::types::MacAddress;
use meshd_node::engine::{RoutingEngine, RoutingHandle};
use meshd_node::netlink::DefaultRouteControl;
use meshd_node::sync_routes::RouteSynchronizer;
use meshd_routing::metrics::StaticMetricTable;
use meshd_routing::pann::RoutingConfig;
use meshd_routing::stats::{MemoryStats, NoopStats};

const NODE: MacAddress = MacAddress::new([0xaa, 0, 0, 0, 0, 0x01]);
const GATE_1: MacAddress = MacAddress::new([0xb1, 0, 0, 0, 0, 0x02]);
const GATE_2: MacAddress = MacAddress::new([0xb2, 0, 0, 0, 0, 0x03]);

/// Records default-route edits made through the netlink seam.
#[derive(Default)]
struct RecordingRoutes {
    events: Mutex<Vec<String>>,
}

impl DefaultRouteControl for RecordingRoutes {
    fn install_default_route(&self, next_hop: MacAddress) -> Result<(), meshd_node::NodeError> {
        self.events.lock().unwrap().push(format!("install {next_hop}"));
        Ok(())
    }

    fn withdraw_default_route(&self) -> Result<(), meshd_node::NodeError> {
        self.events.lock().unwrap().push("withdraw".to_string());
        Ok(())
    }
}

struct Harness {
    routing: RoutingHandle,
    metrics: Arc<StaticMetricTable>,
    routes: Arc<RecordingRoutes>,
    sync: RouteSynchronizer,
    _stop_tx: watch::Sender<bool>,
}

async fn spawn_harness() -> Harness {
    let metrics = Arc::new(StaticMetricTable::new(None));
    let (stop_tx, stop_rx) = watch::channel(false);
    let (routing, _task) = RoutingEngine::spawn(
        RoutingConfig {
            node_addr: NODE,
            element_ttl: 31,
            active_path_timeout: Duration::from_secs(60),
            root_pann_interval: Duration::from_secs(5),
            act_as_root: false,
        },
        metrics.clone(),
        Arc::new(MemoryStats::new()),
        stop_rx,
    );

    let routes = Arc::new(RecordingRoutes::default());
    let sync = RouteSynchronizer::new(
        routing.clone(),
        routes.clone(),
        Arc::new(NoopStats),
        Duration::from_secs(1),
    );

    Harness {
        routing,
        metrics,
        routes,
        sync,
        _stop_tx: stop_tx,
    }
}

/// Announce `gate` directly to this node; the path metric ends up equal to
/// the configured link metric.
async fn announce_gate(h: &Harness, gate: MacAddress, sn: u64, link_metric: u32) {
    h.metrics.set(gate, link_metric);
    let frame = PannFrame {
        orig_addr: gate,
        orig_sn: sn,
        hop_count: 0,
        ttl: 31,
        target_addr: MacAddress::BROADCAST,
        metric: 0,
        is_gate: true,
        reply_requested: false,
    };
    h.routing
        .receive_packet(gate, frame.serialize())
        .await
        .unwrap();
    // Round-trip to make sure the frame was processed.
    let _ = h.routing.dump_mpaths().await.unwrap();
}

fn events(h: &Harness) -> Vec<String> {
    h.routes.events.lock().unwrap().clone()
}

#[tokio::test]
async fn first_gate_installs_default_route() {
    let mut h = spawn_harness().await;

    announce_gate(&h, GATE_1, 1, 100).await;
    h.sync.sync_once().await.unwrap();

    assert_eq!(events(&h), vec![format!("install {GATE_1}")]);
    assert_eq!(h.sync.current_gate(), Some(GATE_1));
}

#[tokio::test]
async fn gate_switch_respects_hysteresis() {
    let mut h = spawn_harness().await;

    announce_gate(&h, GATE_1, 1, 100).await;
    h.sync.sync_once().await.unwrap();

    // A candidate at metric 60: 60 × 2 = 120 > 100, no switch.
    announce_gate(&h, GATE_2, 1, 60).await;
    h.sync.sync_once().await.unwrap();
    assert_eq!(h.sync.current_gate(), Some(GATE_1));
    assert_eq!(events(&h).len(), 1, "no route change for a marginal candidate");

    // The candidate improves to metric 40: 40 × 2 = 80 ≤ 100, switch.
    announce_gate(&h, GATE_2, 1, 40).await;
    h.sync.sync_once().await.unwrap();
    assert_eq!(h.sync.current_gate(), Some(GATE_2));
    assert_eq!(
        events(&h),
        vec![format!("install {GATE_1}"), format!("install {GATE_2}")]
    );
}

#[tokio::test]
async fn becoming_a_gate_withdraws_learned_route() {
    let mut h = spawn_harness().await;

    announce_gate(&h, GATE_1, 1, 100).await;
    h.sync.sync_once().await.unwrap();

    h.routing.set_gateway_status(true).await.unwrap();
    h.sync.sync_once().await.unwrap();

    assert_eq!(
        events(&h),
        vec![format!("install {GATE_1}"), "withdraw".to_string()]
    );
    assert_eq!(h.sync.current_gate(), None);

    // Steady state as a gate: nothing more to do.
    h.sync.sync_once().await.unwrap();
    assert_eq!(events(&h).len(), 2);
}

#[tokio::test]
async fn no_gates_means_no_route_changes() {
    let mut h = spawn_harness().await;
    h.sync.sync_once().await.unwrap();
    assert!(events(&h).is_empty());
    assert_eq!(h.sync.current_gate(), None);
}
