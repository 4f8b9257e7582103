//! Domain-rewriting reverse proxy.
//!
//! Forwards every request to a single backend and relays the answer, stripping
//! the backend's hostname from redirects and HTML documents.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────────┐
//!                      │                     PROXY                          │
//!   Caller Request     │  ┌────────┐    ┌───────────┐    ┌──────────────┐  │
//!   ───────────────────┼─▶│  http  │───▶│ forwarder │───▶│   backend    │──┼──▶ Backend
//!                      │  │ server │    │ + headers │    │  (hyper-util)│  │
//!                      │  └────────┘    └───────────┘    └──────┬───────┘  │
//!                      │                                        ▼          │
//!   Caller Response    │  ┌────────┐    ┌───────────┐    ┌──────────────┐  │
//!   ◀──────────────────┼──│ relay  │◀───│ classify  │◀───│   response   │◀─┼─── Backend
//!                      │  │        │    │ rewrite / │    │    head      │  │
//!                      │  └────────┘    │  stream   │    └──────────────┘  │
//!                      │                └───────────┘                      │
//!                      └───────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use domain_rewrite_proxy::config::load_config;
use domain_rewrite_proxy::observability::{logging, metrics};
use domain_rewrite_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "domain-rewrite-proxy")]
#[command(about = "Reverse proxy that hides the backend hostname from callers", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. BACKEND_DOMAIN and FRONTEND_DOMAIN
    /// override the values it contains.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("domain-rewrite-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend = %config.backend.origin,
        frontend = ?config.cors.frontend_domain,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
