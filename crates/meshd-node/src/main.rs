use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use meshd_node::config::MeshdConfig;
use meshd_node::debugfs::DebugStatusWriter;
use meshd_node::engine::RoutingEngine;
use meshd_node::monitor::{GatewayConnectivityMonitor, MonitorConfig};
use meshd_node::netlink::LogOnlyNetlink;
use meshd_node::sync_routes::RouteSynchronizer;
use meshd_node::transport::UdpRoutingTransport;
use meshd_routing::metrics::StaticMetricTable;
use meshd_routing::stats::LogStats;

#[derive(Parser)]
#[command(name = "meshd", about = "802.11s mesh control-plane daemon")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/meshd/config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        meshd_node::logging::init_json();
    } else {
        meshd_node::logging::init();
    }

    let config = match MeshdConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config from {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run(config: MeshdConfig) -> Result<(), meshd_node::NodeError> {
    // Configuration validation is fatal at startup only.
    let routing_config = config.routing_config()?;
    let dampener_config = config.dampener_config()?;
    let monitored_addresses = config.gateway_monitor.monitored_addresses()?;

    let stats = Arc::new(LogStats);
    let netlink = Arc::new(LogOnlyNetlink);

    let metrics = Arc::new(StaticMetricTable::new(config.metrics.default_link_metric));
    for peer in &config.metrics.peers {
        let addr = peer.address.parse().map_err(|_| {
            meshd_node::NodeError::Config(format!("invalid peer address '{}'", peer.address))
        })?;
        metrics.set(addr, peer.metric);
    }

    let debug_writer = match (&config.debugfs.enabled, &config.debugfs.dir) {
        (true, Some(dir)) => DebugStatusWriter::new(PathBuf::from(dir)),
        _ => DebugStatusWriter::disabled(),
    };

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

    // Engine loop: path table, housekeeping, and root announcements.
    let (routing, engine_task) = RoutingEngine::spawn(
        routing_config,
        metrics.clone(),
        stats.clone(),
        stop_rx.clone(),
    );

    // Frame transport on the mesh interface.
    let transport =
        UdpRoutingTransport::bind(&config.node.mesh_interface, config.node.routing_port).await?;
    routing
        .set_send_packet_callback(transport.sender())
        .await?;
    let receiver_task = transport.spawn_receiver(routing.clone(), stats.clone(), stop_rx.clone());

    // Monitor loop: probes, dampener, gateway role.
    let monitor_task = if config.gateway_monitor.enabled {
        let monitor = GatewayConnectivityMonitor::new(
            MonitorConfig {
                interface: config.gateway_monitor.interface.clone(),
                addresses: monitored_addresses,
                interval: Duration::from_secs(config.gateway_monitor.interval_s),
                socket_timeout: Duration::from_secs(config.gateway_monitor.socket_timeout_s),
                robustness: config.gateway_monitor.robustness,
                set_root_mode_if_gate: config.gateway_monitor.set_root_mode_if_gate,
                proc_conf_dir: MonitorConfig::default_proc_conf_dir(),
            },
            dampener_config,
            routing.clone(),
            netlink.clone(),
            stats.clone(),
            debug_writer,
        )?;
        Some(tokio::spawn(monitor.run(stop_rx.clone())))
    } else {
        None
    };

    // Default-route reconciliation against the elected gate.
    let synchronizer = RouteSynchronizer::new(
        routing.clone(),
        netlink,
        stats,
        Duration::from_millis(config.node.route_sync_interval_ms),
    );
    let sync_task = tokio::spawn(synchronizer.run(stop_rx));

    // Run until SIGINT or SIGTERM; SIGUSR1 dumps the path table.
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        let mut sigusr1 =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::user_defined1())?;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("received SIGINT, shutting down");
                    break;
                }
                _ = sigterm.recv() => {
                    tracing::info!("received SIGTERM, shutting down");
                    break;
                }
                _ = sigusr1.recv() => {
                    match routing.dump_mpaths().await {
                        Ok(paths) => {
                            let rows = meshd_node::engine::dump_path_info(
                                &paths,
                                std::time::Instant::now(),
                            );
                            match serde_json::to_string(&rows) {
                                Ok(json) => tracing::info!(mpaths = %json, "path table dump"),
                                Err(e) => tracing::warn!(error = %e, "failed to render path table"),
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "cannot dump path table"),
                    }
                }
            }
        }
    }
    #[cfg(not(unix))]
    let _ = tokio::signal::ctrl_c().await;

    let _ = stop_tx.send(true);
    let _ = routing.reset_send_packet_callback().await;

    for task in [Some(engine_task), Some(receiver_task), monitor_task, Some(sync_task)]
        .into_iter()
        .flatten()
    {
        let _ = task.await;
    }
    Ok(())
}
