//! TOML-based configuration for the meshd daemon.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use meshd_core::constants::{DEFAULT_ELEMENT_TTL, ROUTING_UDP_PORT};
use meshd_core::types::MacAddress;
use meshd_routing::dampener::DampenerConfig;
use meshd_routing::pann::RoutingConfig;

use crate::error::NodeError;

/// Top-level daemon configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct MeshdConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub gateway_monitor: GatewayMonitorSection,
    #[serde(default)]
    pub dampener: DampenerSection,
    #[serde(default)]
    pub metrics: MetricsSection,
    #[serde(default)]
    pub debugfs: DebugfsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl MeshdConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))
    }

    /// Build the routing engine parameters, validating them.
    pub fn routing_config(&self) -> Result<RoutingConfig, NodeError> {
        let config = RoutingConfig {
            node_addr: self.node.node_addr()?,
            element_ttl: self.node.element_ttl,
            active_path_timeout: Duration::from_millis(self.node.active_path_timeout_ms),
            root_pann_interval: Duration::from_millis(self.node.root_pann_interval_ms),
            act_as_root: self.node.act_as_root,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build the dampener parameters, validating them.
    pub fn dampener_config(&self) -> Result<DampenerConfig, NodeError> {
        let config = DampenerConfig {
            penalty: self.dampener.penalty,
            suppress_limit: self.dampener.suppress_limit,
            reuse_limit: self.dampener.reuse_limit,
            half_life: Duration::from_secs(self.dampener.half_life_s),
            max_suppress_limit: self.dampener.max_suppress_limit,
        };
        config.validate()?;
        Ok(config)
    }
}

/// The `[node]` section: mesh identity and routing protocol parameters.
#[derive(Debug, Deserialize)]
pub struct NodeSection {
    /// This node's MAC address on the mesh, `aa:bb:cc:dd:ee:ff` form.
    #[serde(default)]
    pub address: String,
    /// Mesh interface routing frames ride on.
    #[serde(default = "default_mesh_interface")]
    pub mesh_interface: String,
    /// UDP port for routing frames.
    #[serde(default = "default_routing_port")]
    pub routing_port: u16,
    #[serde(default = "default_element_ttl")]
    pub element_ttl: u8,
    /// Path expiry horizon; also the housekeeping period.
    #[serde(default = "default_active_path_timeout_ms")]
    pub active_path_timeout_ms: u64,
    /// Period of root announcements while acting as root.
    #[serde(default = "default_root_pann_interval_ms")]
    pub root_pann_interval_ms: u64,
    /// Announce as root even without gateway status.
    #[serde(default)]
    pub act_as_root: bool,
    /// Period of default-route reconciliation.
    #[serde(default = "default_route_sync_interval_ms")]
    pub route_sync_interval_ms: u64,
}

impl NodeSection {
    /// Parse the configured MAC address.
    pub fn node_addr(&self) -> Result<MacAddress, NodeError> {
        self.address.parse().map_err(|_| {
            NodeError::Config(format!("invalid node address '{}'", self.address))
        })
    }
}

fn default_mesh_interface() -> String {
    "mesh0".to_string()
}

fn default_routing_port() -> u16 {
    ROUTING_UDP_PORT
}

fn default_element_ttl() -> u8 {
    DEFAULT_ELEMENT_TTL
}

fn default_active_path_timeout_ms() -> u64 {
    30_000
}

fn default_root_pann_interval_ms() -> u64 {
    5_000
}

fn default_route_sync_interval_ms() -> u64 {
    1_000
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            address: String::new(),
            mesh_interface: default_mesh_interface(),
            routing_port: default_routing_port(),
            element_ttl: default_element_ttl(),
            active_path_timeout_ms: default_active_path_timeout_ms(),
            root_pann_interval_ms: default_root_pann_interval_ms(),
            act_as_root: false,
            route_sync_interval_ms: default_route_sync_interval_ms(),
        }
    }
}

/// The `[gateway_monitor]` section.
#[derive(Debug, Deserialize)]
pub struct GatewayMonitorSection {
    #[serde(default = "default_monitor_enabled")]
    pub enabled: bool,
    /// Upstream interface probes are bound to.
    #[serde(default = "default_monitored_interface")]
    pub interface: String,
    /// Probe targets, tried in order until one accepts.
    #[serde(default = "default_monitored_addresses")]
    pub addresses: Vec<String>,
    #[serde(default = "default_monitor_interval_s")]
    pub interval_s: u64,
    #[serde(default = "default_monitor_socket_timeout_s")]
    pub socket_timeout_s: u64,
    /// Probe attempts per tick before declaring connectivity lost.
    #[serde(default = "default_robustness")]
    pub robustness: u32,
    /// Root-mode value to program while acting as gate; 0 disables.
    #[serde(default)]
    pub set_root_mode_if_gate: u8,
}

impl GatewayMonitorSection {
    /// Resolve the configured probe targets.
    pub fn monitored_addresses(&self) -> Result<Vec<SocketAddr>, NodeError> {
        let mut out = Vec::with_capacity(self.addresses.len());
        for addr in &self.addresses {
            let resolved = addr
                .to_socket_addrs()
                .map_err(|e| NodeError::Config(format!("invalid probe address '{addr}': {e}")))?
                .next()
                .ok_or_else(|| {
                    NodeError::Config(format!("probe address '{addr}' resolved to nothing"))
                })?;
            out.push(resolved);
        }
        Ok(out)
    }
}

fn default_monitor_enabled() -> bool {
    true
}

fn default_monitored_interface() -> String {
    "eth0".to_string()
}

fn default_monitored_addresses() -> Vec<String> {
    vec!["8.8.8.8:443".to_string(), "1.1.1.1:443".to_string()]
}

fn default_monitor_interval_s() -> u64 {
    10
}

fn default_monitor_socket_timeout_s() -> u64 {
    5
}

fn default_robustness() -> u32 {
    2
}

impl Default for GatewayMonitorSection {
    fn default() -> Self {
        Self {
            enabled: default_monitor_enabled(),
            interface: default_monitored_interface(),
            addresses: default_monitored_addresses(),
            interval_s: default_monitor_interval_s(),
            socket_timeout_s: default_monitor_socket_timeout_s(),
            robustness: default_robustness(),
            set_root_mode_if_gate: 0,
        }
    }
}

/// The `[dampener]` section.
#[derive(Debug, Deserialize)]
pub struct DampenerSection {
    #[serde(default = "default_penalty")]
    pub penalty: u32,
    #[serde(default = "default_suppress_limit")]
    pub suppress_limit: u32,
    #[serde(default = "default_reuse_limit")]
    pub reuse_limit: u32,
    #[serde(default = "default_half_life_s")]
    pub half_life_s: u64,
    #[serde(default = "default_max_suppress_limit")]
    pub max_suppress_limit: u32,
}

fn default_penalty() -> u32 {
    1000
}

fn default_suppress_limit() -> u32 {
    2000
}

fn default_reuse_limit() -> u32 {
    750
}

fn default_half_life_s() -> u64 {
    60
}

fn default_max_suppress_limit() -> u32 {
    20_000
}

impl Default for DampenerSection {
    fn default() -> Self {
        Self {
            penalty: default_penalty(),
            suppress_limit: default_suppress_limit(),
            reuse_limit: default_reuse_limit(),
            half_life_s: default_half_life_s(),
            max_suppress_limit: default_max_suppress_limit(),
        }
    }
}

/// The `[metrics]` section: link metrics until an estimator is attached.
#[derive(Debug, Default, Deserialize)]
pub struct MetricsSection {
    /// Metric assumed for peers with no explicit entry; absent means
    /// frames from unlisted peers are dropped.
    pub default_link_metric: Option<u32>,
    /// Static per-peer link metrics.
    #[serde(default)]
    pub peers: Vec<PeerMetricEntry>,
}

/// A `[[metrics.peers]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PeerMetricEntry {
    pub address: String,
    pub metric: u32,
}

/// The `[debugfs]` section.
#[derive(Debug, Default, Deserialize)]
pub struct DebugfsSection {
    #[serde(default)]
    pub enabled: bool,
    /// Directory status records are written into.
    pub dir: Option<String>,
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
