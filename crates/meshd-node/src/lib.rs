//! Daemon orchestration for the meshd 802.11s control plane.
//!
//! This crate ties the pure routing state machines to the runtime: the
//! routing engine actor and its handle, the gateway connectivity monitor,
//! the route synchronizer, the UDP routing transport, configuration, and
//! logging.

pub mod config;
pub mod debugfs;
pub mod engine;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod netlink;
pub mod probe;
pub mod sync_routes;
pub mod transport;

pub use config::MeshdConfig;
pub use engine::{RoutingEngine, RoutingHandle};
pub use error::NodeError;
pub use monitor::GatewayConnectivityMonitor;
pub use sync_routes::RouteSynchronizer;
