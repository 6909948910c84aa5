//! relay-proxy
//!
//! Serves the proxied routes of a TOML configuration file.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌────────────────────────────────────────────────┐
//!                         │                  RELAY PROXY                   │
//!                         │                                                │
//!     Client Request      │  ┌─────────┐   ┌────────────┐   ┌───────────┐  │
//!     ────────────────────┼─▶│  http   │──▶│ forwarding │──▶│  client   │──┼──▶ Target
//!                         │  │ server  │   │orchestrator│   │ dispatch  │  │
//!                         │  └─────────┘   └─────┬──────┘   └───────────┘  │
//!     Client Response     │                      │ hooks                   │
//!     ◀───────────────────┼──────── relay ◀──────┘                         │
//!                         │                                                │
//!                         │  config · observability · lifecycle            │
//!                         └────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use relay_proxy::config::{load_config, ProxyConfig};
use relay_proxy::lifecycle::{signals, Shutdown};
use relay_proxy::observability::{logging, metrics};
use relay_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "relay-proxy")]
#[command(about = "HTTP reverse proxy forwarding configured routes", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "RELAY_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability)?;
    tracing::info!("relay-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    if cli.config.is_none() {
        tracing::warn!("No configuration file given; serving without routes");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        request_timeout_secs = config.client.request_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    server.run(listener, shutdown_rx).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
