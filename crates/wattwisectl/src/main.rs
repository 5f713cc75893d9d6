//! Wattwise Control - line-mode front end
//!
//! `wattwisectl` with no subcommand starts the chat loop.

use anyhow::Result;
use clap::Parser;
use tracing::warn;
use wattwise_common::runtime::{self, Runtime};
use wattwise_common::{logging, AgentDeps, OutputFormat, WattwiseConfig};
use wattwisectl::cli::{Cli, Commands};
use wattwisectl::{chat, commands, output};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    let config = WattwiseConfig::load(cli.config.as_deref())?;

    // Searching needs no provider credentials
    if let Commands::Search { query } = cli.command() {
        let deps = AgentDeps::new(runtime::open_store(&config).await?);
        let result = commands::search(&deps, &query.join(" ")).await;
        if let Err(e) = deps.store.close().await {
            warn!(error = %e, "Failed to close fact store");
        }
        return result;
    }

    let runtime = Runtime::start(&config, OutputFormat::Markdown).await?;
    let result = dispatch(&runtime, cli.command(), &config).await;
    runtime.shutdown().await;
    result
}

async fn dispatch(runtime: &Runtime, command: Commands, config: &WattwiseConfig) -> Result<()> {
    let Runtime { agent, deps } = runtime;

    match command {
        Commands::Chat => {
            output::print_banner(&config.provider.model);
            chat::run(agent, deps).await
        }
        Commands::Ask { question, json } => commands::ask(agent, deps, &question.join(" "), json).await,
        Commands::Calc {
            appliance,
            duration,
            unit,
            rate,
            city,
            json,
        } => {
            let form = commands::usage_form(&appliance, duration, &unit, rate, city.as_deref())?;
            commands::calc(agent, deps, &form, json).await
        }
        Commands::Search { query } => commands::search(deps, &query.join(" ")).await,
    }
}
