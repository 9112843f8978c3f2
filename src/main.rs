//! Multi-provider JSON-RPC gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                   RPC GATEWAY                     │
//!                      │                                                   │
//!   JSON-RPC request   │  ┌────────┐   ┌──────────┐   ┌──────────────┐    │
//!   ───────────────────┼─▶│  http  │──▶│ registry │──▶│  UniProvider │    │
//!                      │  │ server │   │(per net) │   │  selection   │    │
//!                      │  └────────┘   └──────────┘   └──────┬───────┘    │
//!                      │                                      ▼            │
//!   JSON-RPC response  │                              ┌──────────────┐    │
//!   ◀──────────────────┼──────────────────────────────│   endpoint   │◀───┼── Upstream
//!                      │                              │ score/probes │    │   provider
//!                      │                              └──────┬───────┘    │
//!                      │                                     │ sync        │
//!   Alarm event        │  ┌────────┐                 ┌──────▼───────┐    │
//!   ───────────────────┼─▶│ alarms │────────────────▶│ health store │    │
//!                      │  └────────┘                 └──────────────┘    │
//!                      └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use rpc_gateway::config::{load_config, load_prod_config, GatewayConfig};
use rpc_gateway::lifecycle::{init_observability, signals, Runtime, Shutdown};

#[derive(Parser)]
#[command(name = "rpc-gateway")]
#[command(about = "Multi-provider JSON-RPC gateway", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON network list replacing the networks of the TOML configuration.
    #[arg(long)]
    prod_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    let config = match &args.prod_config {
        Some(path) => load_prod_config(path, config)?,
        None => config,
    };

    init_observability(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rpc-gateway starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        networks = config.networks.len(),
        request_timeout_secs = config.server.request_timeout_secs,
        "Configuration loaded"
    );

    let runtime = Runtime::initialize(config).await?;

    let shutdown = Shutdown::new();
    signals::forward_ctrl_c(shutdown.clone());
    runtime.serve(&shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
