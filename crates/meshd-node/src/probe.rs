//! Interface-bound TCP connectivity probe.
//!
//! Each probe is one TCP connect attempt bound to the monitored interface,
//! raced against a timeout. The socket is built with socket2 so it can be
//! bound to the device before connecting, then handed to tokio for the
//! non-blocking connect. Sockets are scoped to the attempt and closed on
//! every exit path.

use std::net::SocketAddr;
use std::time::Duration;

use socket2::{Domain, Socket, Type};
use tracing::trace;

use crate::error::NodeError;

/// Why a probe attempt failed; keys the failure stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    /// No response within the socket timeout.
    Timeout,
    /// The target actively refused the connection.
    Refused,
    /// No route to the target network or host.
    Unreachable,
    /// Socket construction or device binding failed.
    Socket,
    /// Any other connect error.
    Error,
}

impl ProbeFailure {
    /// Stable key for stats reporting.
    pub fn as_stat_key(&self) -> &'static str {
        match self {
            ProbeFailure::Timeout => "timeout",
            ProbeFailure::Refused => "refused",
            ProbeFailure::Unreachable => "unreachable",
            ProbeFailure::Socket => "socket",
            ProbeFailure::Error => "error",
        }
    }
}

/// Attempt one bound TCP connect to `addr` within `timeout`.
///
/// `interface` of `None` skips device binding (used by tests; binding
/// requires CAP_NET_RAW).
pub async fn probe_connect(
    interface: Option<&str>,
    addr: SocketAddr,
    timeout: Duration,
) -> Result<(), ProbeFailure> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket =
        Socket::new(domain, Type::STREAM, None).map_err(|_| ProbeFailure::Socket)?;
    socket
        .set_reuse_address(true)
        .map_err(|_| ProbeFailure::Socket)?;
    if let Some(ifname) = interface {
        socket
            .bind_device(Some(ifname.as_bytes()))
            .map_err(|_| ProbeFailure::Socket)?;
    }
    socket
        .set_nonblocking(true)
        .map_err(|_| ProbeFailure::Socket)?;

    let socket = tokio::net::TcpSocket::from_std_stream(socket.into());
    match tokio::time::timeout(timeout, socket.connect(addr)).await {
        Ok(Ok(_stream)) => {
            trace!(%addr, "probe connected");
            Ok(())
        }
        Ok(Err(e)) => Err(classify_connect_error(&e)),
        Err(_) => Err(ProbeFailure::Timeout),
    }
}

fn classify_connect_error(e: &std::io::Error) -> ProbeFailure {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => ProbeFailure::Refused,
        std::io::ErrorKind::TimedOut => ProbeFailure::Timeout,
        _ => match e.raw_os_error() {
            // ENETUNREACH / EHOSTUNREACH
            Some(101) | Some(113) => ProbeFailure::Unreachable,
            _ => ProbeFailure::Error,
        },
    }
}

/// Disable reverse-path filtering for the monitored interface.
///
/// Probes bound to the monitored interface may use source addresses the
/// kernel considers non-routable; rp_filter would silently drop the
/// replies. Writes "0" to `<base>/<interface>/rp_filter` and
/// `<base>/all/rp_filter`; idempotent, and failures are reported to the
/// caller for logging only.
pub fn disable_reverse_path_filter(
    base: &std::path::Path,
    interface: &str,
) -> Result<(), NodeError> {
    std::fs::write(base.join(interface).join("rp_filter"), "0")?;
    std::fs::write(base.join("all").join("rp_filter"), "0")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn stat_keys_are_stable() {
        assert_eq!(ProbeFailure::Timeout.as_stat_key(), "timeout");
        assert_eq!(ProbeFailure::Refused.as_stat_key(), "refused");
        assert_eq!(ProbeFailure::Unreachable.as_stat_key(), "unreachable");
    }

    #[test]
    fn classify_connect_errors() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(classify_connect_error(&refused), ProbeFailure::Refused);

        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(classify_connect_error(&timed_out), ProbeFailure::Timeout);

        let unreachable = io::Error::from_raw_os_error(101);
        assert_eq!(
            classify_connect_error(&unreachable),
            ProbeFailure::Unreachable
        );

        let other = io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(classify_connect_error(&other), ProbeFailure::Error);
    }

    #[tokio::test]
    async fn probe_succeeds_against_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let result = probe_connect(None, addr, Duration::from_secs(1)).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn probe_reports_refusal() {
        // Bind then drop to find a port that refuses connections.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = probe_connect(None, addr, Duration::from_secs(1)).await;
        assert_eq!(result, Err(ProbeFailure::Refused));
    }

    #[test]
    fn rp_filter_writes_zero() {
        let base = std::env::temp_dir().join(format!("meshd-rpf-{}", std::process::id()));
        std::fs::create_dir_all(base.join("wan0")).unwrap();
        std::fs::create_dir_all(base.join("all")).unwrap();

        disable_reverse_path_filter(&base, "wan0").unwrap();
        assert_eq!(
            std::fs::read_to_string(base.join("wan0/rp_filter")).unwrap(),
            "0"
        );
        assert_eq!(
            std::fs::read_to_string(base.join("all/rp_filter")).unwrap(),
            "0"
        );

        // Idempotent.
        disable_reverse_path_filter(&base, "wan0").unwrap();

        std::fs::remove_dir_all(&base).unwrap();
    }

    #[test]
    fn rp_filter_missing_dir_is_an_error() {
        let base = std::env::temp_dir().join("meshd-rpf-does-not-exist");
        assert!(disable_reverse_path_filter(&base, "wan0").is_err());
    }
}
