//! DueDiligence CLI: company due-diligence reports from public signals.
//!
//! Runs the staged analysis pipeline for a company name, or serves the
//! pipeline and its standalone tools over HTTP or to MCP clients on stdio.

mod commands;
mod mcp;
mod server;

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
