//! Routing state machines for the meshd control plane.
//!
//! This crate holds the pure, synchronous half of the daemon: the mesh path
//! table, the PANN ingress/egress state machine, gateway election with
//! hysteresis, and the route dampener. Everything here takes explicit `now`
//! parameters and returns actions for the async layer to execute, so it is
//! deterministic under test.

pub mod dampener;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod pann;
pub mod path;
pub mod stats;

pub use dampener::{DampenerConfig, DampenerEvent, RouteDampener};
pub use error::ConfigError;
pub use gate::{RouteSyncAction, RouteSyncPlanner, select_best_gate};
pub use metrics::{MetricSource, StaticMetricTable};
pub use pann::{PannAction, PannOutcome, RoutingConfig, RoutingState};
pub use path::{MeshPath, PathTable};
pub use stats::{LogStats, MemoryStats, NoopStats, StatsSink};
