//! REST batch request executor.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                   BATCH SERVER                       │
//!                    │                                                      │
//!  POST /batch       │  ┌────────┐   ┌─────────┐   ┌──────────┐             │
//!  ──────────────────┼─▶│  http  │──▶│  batch  │──▶│ executor │             │
//!                    │  │ server │   │ handler │   │seq / pool│             │
//!                    │  └────────┘   └─────────┘   └────┬─────┘             │
//!                    │                                  │ per item          │
//!                    │                                  ▼                   │
//!                    │                            ┌──────────┐  ┌─────────┐ │
//!                    │                            │ dispatch │─▶│isolation│ │
//!                    │                            │ + router │  │  scope  │ │
//!                    │                            └────┬─────┘  └─────────┘ │
//!  {"responses":[..]}│                                 ▼                    │
//!  ◀─────────────────┼──────────────────────────── envelopes                │
//!                    │                                                      │
//!                    │  config · auth · observability · lifecycle           │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use rest_batch::config::{load_config, AppConfig};
use rest_batch::isolation::MemoryStore;
use rest_batch::observability::{logging, metrics};
use rest_batch::{api, HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "rest-batch")]
#[command(about = "Batch request executor for REST backends", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("rest-batch v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        execute_parallel = config.batch.execute_parallel,
        num_workers = config.batch.num_workers,
        max_limit = config.batch.max_limit,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    let store = MemoryStore::new();
    let server = HttpServer::new(config, api::routes(), Arc::new(store))?;

    let shutdown = Shutdown::new();
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
