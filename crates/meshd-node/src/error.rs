//! Error types for the daemon layer.

use meshd_routing::error::ConfigError;

/// Errors that can occur while running the daemon.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("routing parameters invalid: {0}")]
    RoutingConfig(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("netlink operation failed: {0}")]
    Netlink(String),
    #[error("routing engine stopped")]
    EngineStopped,
}
