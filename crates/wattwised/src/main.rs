//! Wattwise Daemon - energy calculator form served over HTTP

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use wattwise_common::runtime::Runtime;
use wattwise_common::{logging, OutputFormat, WattwiseConfig};
use wattwised::server::{self, AppState};

#[derive(Parser)]
#[command(name = "wattwised")]
#[command(about = "Wattwise energy calculator form server", long_about = None)]
#[command(version)]
struct Args {
    /// Config file (default: $WATTWISE_CONFIG or ~/.config/wattwise/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on (overrides server.bind)
    #[arg(long)]
    bind: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose)?;

    info!("Wattwise daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let config = WattwiseConfig::load(args.config.as_deref())?;
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());

    let state = Arc::new(AppState::new(
        Runtime::start(&config, OutputFormat::Html).await?,
    ));

    let result = server::run(state.clone(), &bind, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown requested");
    })
    .await;

    state.runtime.shutdown().await;
    result
}
