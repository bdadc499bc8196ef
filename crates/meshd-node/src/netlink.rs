//! Seams toward the kernel netlink handlers.
//!
//! The generic-netlink wrapper that programs mac80211 mesh parameters and
//! the rtnetlink wrapper that edits the routing table are external
//! collaborators; the daemon talks to them through these traits. The
//! log-only implementation lets the daemon run (and be observed) on hosts
//! without the kernel plumbing.

use meshd_core::types::MacAddress;

use crate::error::NodeError;

/// Programs the 802.11s root-mode parameter on the mesh interface.
pub trait RootModeControl: Send + Sync {
    fn set_root_mode(&self, mode: u8) -> Result<(), NodeError>;
}

/// Edits the kernel default route learned from the mesh.
pub trait DefaultRouteControl: Send + Sync {
    /// Point the default route at `next_hop` on the mesh interface,
    /// replacing any previously installed one.
    fn install_default_route(&self, next_hop: MacAddress) -> Result<(), NodeError>;

    /// Remove the learned default route, if any.
    fn withdraw_default_route(&self) -> Result<(), NodeError>;
}

/// Implementation that only logs the intent.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyNetlink;

impl RootModeControl for LogOnlyNetlink {
    fn set_root_mode(&self, mode: u8) -> Result<(), NodeError> {
        tracing::info!(mode, "would set mesh root mode");
        Ok(())
    }
}

impl DefaultRouteControl for LogOnlyNetlink {
    fn install_default_route(&self, next_hop: MacAddress) -> Result<(), NodeError> {
        tracing::info!(next_hop = %next_hop, "would install default route");
        Ok(())
    }

    fn withdraw_default_route(&self) -> Result<(), NodeError> {
        tracing::info!("would withdraw default route");
        Ok(())
    }
}
