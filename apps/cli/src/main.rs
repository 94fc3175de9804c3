//! Addin auditor CLI.
//!
//! Discovers Cake addins, checks each one against the recommended practices,
//! and publishes the findings as a markdown report and repository issues.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
