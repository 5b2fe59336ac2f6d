//! gateway-pipeline server binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server (request ID, trace, timeout, body limit)
//!                         │
//!                         ▼
//!                     pipeline stages
//!                     json_body → sanitize → dedupe_params → rate_limit → request_time
//!                         │                                     │
//!                         ▼                                     ▼ (denied / failed)
//!                     route dispatch ──── handler error ──▶ error normalizer
//!                         │                                     │
//!     Client Response     ▼                                     ▼
//!     ◀────────────── JSON success                       JSON error envelope
//! ```

use std::path::PathBuf;

use clap::Parser;

use gateway_pipeline::config::{load_config, Environment, GatewayConfig};
use gateway_pipeline::lifecycle::{self, signals, Shutdown};
use gateway_pipeline::observability::logging;

#[derive(Parser)]
#[command(name = "gateway-pipeline")]
#[command(about = "HTTP request pipeline with sanitization and admission control", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured environment (development | production).
    #[arg(short, long)]
    env: Option<Environment>,

    /// Override the configured bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(env) = cli.env {
        config.environment = env;
    }
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability, config.environment);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gateway-pipeline starting");
    tracing::info!(
        environment = %config.environment,
        bind_address = %config.listener.bind_address,
        gated_prefix = %config.rate_limit.gated_prefix,
        capacity = config.rate_limit.capacity,
        window_secs = config.rate_limit.window_secs,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    let server = lifecycle::start(config, gateway_pipeline::demo::routes(), &shutdown).await?;
    signals::spawn_signal_listener(shutdown.clone());

    server.handle.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
