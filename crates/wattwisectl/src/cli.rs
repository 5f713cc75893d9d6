//! Command-line surface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "wattwisectl")]
#[command(about = "Wattwise - energy usage questions answered from a knowledge graph", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: $WATTWISE_CONFIG or ~/.config/wattwise/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Subcommand to run; no subcommand means chat
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Chat)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Interactive chat (default)
    Chat,

    /// Ask a single question and print the answer
    Ask {
        #[arg(required = true)]
        question: Vec<String>,

        /// Print the agent message, with its searches, as JSON
        #[arg(long)]
        json: bool,
    },

    /// Estimate consumption and cost for one appliance
    Calc {
        /// Fridge, Heater, TV, Air Conditioner, Laptop or Microwave
        #[arg(long)]
        appliance: String,

        /// Daily usage amount
        #[arg(long)]
        duration: f64,

        /// hours/day or minutes/day
        #[arg(long, default_value = "hours/day")]
        unit: String,

        /// Custom electricity rate in $/kWh; wins over --city
        #[arg(long)]
        rate: Option<f64>,

        /// City whose rate to use
        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Search the knowledge graph directly
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },
}
