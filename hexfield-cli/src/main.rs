//! HEXFIELD CLI - Command-line interface
//!
//! Commands:
//! - inspect: Show what the current player's units may do
//! - run: Replay a scripted sequence of commands against a scenario
//! - roll: Interpret a single recovery roll

mod inspect;
mod report;
mod roll;
mod run_cmd;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hexfield")]
#[command(about = "HEXFIELD hex-grid wargame rules engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show units, allowed actions, moves and rotations
    Inspect(inspect::InspectArgs),
    /// Execute a JSON command script
    Run(run_cmd::RunArgs),
    /// Interpret one recovery roll with the default tables
    Roll(roll::RollArgs),
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so JSON output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect(args) => inspect::run(args),
        Commands::Run(args) => run_cmd::run(args),
        Commands::Roll(args) => roll::run(args),
    }
}
