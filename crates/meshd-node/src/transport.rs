//! UDP routing packet transport.
//!
//! Routing frames ride UDP datagrams on the mesh interface. Peers are
//! addressed by their EUI-64 IPv6 link-local address derived from the
//! destination MAC; the broadcast MAC maps to the all-nodes multicast
//! group `ff02::1`. Ingress datagrams recover the sender MAC from the
//! link-local source address.

use std::net::{Ipv6Addr, SocketAddr, SocketAddrV6};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use meshd_core::types::MacAddress;
use meshd_routing::stats::StatsSink;

use crate::engine::{RoutingHandle, SendPacketFn};
use crate::error::NodeError;

/// Receive buffer size; routing frames are far smaller.
const RECV_BUFFER: usize = 512;

/// All-nodes link-local multicast group, the broadcast destination.
const ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// UDP transport bound to the mesh interface for routing frames.
pub struct UdpRoutingTransport {
    socket: Arc<UdpSocket>,
    scope_id: u32,
    port: u16,
}

impl UdpRoutingTransport {
    /// Bind the routing socket and resolve the mesh interface's scope id.
    pub async fn bind(interface: &str, port: u16) -> Result<Self, NodeError> {
        let scope_id = ifindex(interface)?;
        let socket =
            UdpSocket::bind(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port))).await?;
        info!(interface, port, scope_id, "routing transport bound");
        Ok(Self {
            socket: Arc::new(socket),
            scope_id,
            port,
        })
    }

    /// Build the engine's egress callback.
    ///
    /// Sends are best-effort: a full socket buffer drops the frame with a
    /// debug log, matching the transport's no-acknowledgement contract.
    pub fn sender(&self) -> SendPacketFn {
        let socket = Arc::clone(&self.socket);
        let scope_id = self.scope_id;
        let port = self.port;
        Box::new(move |da: MacAddress, bytes: Vec<u8>| {
            let dst_ip = if da.is_broadcast() {
                ALL_NODES
            } else {
                da.to_link_local()
            };
            let dst = SocketAddrV6::new(dst_ip, port, 0, scope_id);
            if let Err(e) = socket.try_send_to(&bytes, dst.into()) {
                debug!(da = %da, error = %e, "routing frame send failed");
            }
        })
    }

    /// Spawn the ingress loop feeding the routing engine.
    pub fn spawn_receiver(
        &self,
        routing: RoutingHandle,
        stats: Arc<dyn StatsSink>,
        mut stop_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        tokio::spawn(async move {
            let mut buf = vec![0u8; RECV_BUFFER];
            loop {
                tokio::select! {
                    result = socket.recv_from(&mut buf) => {
                        match result {
                            Ok((n, src)) => {
                                let Some(sa) = sender_mac(&src) else {
                                    debug!(%src, "datagram from non-link-local source");
                                    stats.increment("transport.non_link_local_source");
                                    continue;
                                };
                                if routing.receive_packet(sa, buf[..n].to_vec()).await.is_err() {
                                    // Engine gone; stop receiving.
                                    return;
                                }
                            }
                            Err(e) => {
                                // UDP errors are typically transient.
                                warn!(error = %e, "routing transport recv error");
                            }
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            info!("routing transport receiver stopped");
        })
    }

    /// Local address of the routing socket.
    pub fn local_addr(&self) -> Result<SocketAddr, NodeError> {
        Ok(self.socket.local_addr()?)
    }
}

/// Recover the sender's MAC address from a datagram source address.
fn sender_mac(src: &SocketAddr) -> Option<MacAddress> {
    match src {
        SocketAddr::V6(v6) => MacAddress::from_link_local(*v6.ip()),
        SocketAddr::V4(_) => None,
    }
}

/// Read the interface index from sysfs.
fn ifindex(interface: &str) -> Result<u32, NodeError> {
    let path = format!("/sys/class/net/{interface}/ifindex");
    let content = std::fs::read_to_string(&path)
        .map_err(|e| NodeError::Config(format!("cannot read {path}: {e}")))?;
    content
        .trim()
        .parse()
        .map_err(|e| NodeError::Config(format!("malformed ifindex in {path}: {e}")))
}
