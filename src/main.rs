//! Fetch gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                FETCH GATEWAY                 │
//!   POST /api/{json,     │  ┌───────────┐   ┌──────────┐   ┌──────────┐ │
//!        xml,rdf}  ──────┼─▶│ envelope  │──▶│   auth   │──▶│ upstream │─┼──▶ External API
//!                        │  │ validator │   │ resolver │   │dispatcher│ │
//!                        │  └───────────┘   └──────────┘   └────┬─────┘ │
//!                        │                                      ▼       │
//!   Envelope   ◀─────────┼──────────── http::response ◀──── parsers     │
//!                        │                              json/xml/rdf    │
//!                        │                                              │
//!                        │  config · observability · lifecycle          │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use fetch_gateway::config::{load_config, override_bind_address, GatewayConfig};
use fetch_gateway::lifecycle::{signals, startup, Shutdown};
use fetch_gateway::HttpServer;

#[derive(Parser)]
#[command(name = "fetch-gateway")]
#[command(about = "HTTP gateway that fetches and normalizes JSON, XML and RDF", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config = override_bind_address(config, bind)?;
    }

    startup::init_observability(&config);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        outbound_timeout_secs = config.outbound.request_timeout_secs,
        "fetch-gateway starting"
    );

    let listener = startup::bind_listener(&config).await?;

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown.clone());

    HttpServer::new(config).run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
