//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics exporter when enabled
//! - Build the server around the route table
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: a bind error is returned, not logged and ignored
//! - Listener starts last (traffic only when ready)

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::GatewayConfig;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::Router;

/// A server running in the background.
pub struct RunningServer {
    pub local_addr: SocketAddr,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

/// Bind and spawn the gateway. It stops when `shutdown` is triggered.
pub async fn start(
    config: GatewayConfig,
    routes: Router,
    shutdown: &Shutdown,
) -> Result<RunningServer, std::io::Error> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    let server = HttpServer::new(config, routes);
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    Ok(RunningServer { local_addr, handle })
}
