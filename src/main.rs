//! Chat gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────┐
//!                          │                 CHAT GATEWAY                 │
//!   POST /api/chat/message │  ┌──────────┐   ┌────────────┐   ┌───────┐   │
//!   ───────────────────────┼─▶│ identity │──▶│ authorizer │──▶│ relay │───┼──▶ Inference
//!                          │  └──────────┘   └─────┬──────┘   └───┬───┘   │    service
//!   ◀── streamed reply ────┼───────────────────────┼──────────────┘       │
//!                          │                  deny │ 401/403              │
//!                          │                       ▼                      │
//!   GET /admin/status      │  ┌──────────┐   ┌────────────┐               │
//!   ───────────────────────┼─▶│ identity │──▶│ authorizer │──▶ dashboard ─┼──▶ N status
//!                          │  └──────────┘   └────────────┘   view        │    endpoints
//!                          └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use chat_gateway::config::{load_config, GatewayConfig};
use chat_gateway::observability::{logging, metrics};
use chat_gateway::{GatewayServer, Shutdown};

#[derive(Parser)]
#[command(name = "chat-gateway", version, about = "Role-gated streaming gateway")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "chat-gateway starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        stream_timeout_secs = config.upstream.stream_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
