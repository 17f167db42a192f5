use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fieldsim", version, about = "Daily agroecosystem simulation with scheduled field operations")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to simulation.yaml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override SQLite data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the configured simulation (default)
    Run {
        /// Also write all results as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Skip storing results in the database
        #[arg(long)]
        no_db: bool,
    },
    /// Validate config, inputs and rotation without simulating
    Check,
    /// Print the work steps of every schedule in the rotation
    Schedule,
    /// Write a starter configuration interactively
    Init,
}
