//! packrat CLI - command-line interface for pack archive tools

pub mod commands;

use clap::Parser;
use commands::Commands;

#[derive(Parser)]
#[command(name = "packrat")]
#[command(about = "packrat: pack archive tools for retro game engines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Run the packrat CLI
pub fn run_cli() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    cli.command.execute()?;

    Ok(())
}
