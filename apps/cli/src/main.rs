//! StackPages CLI: build-time stack pages for a markdown site.
//!
//! Registers content nodes, tags them with their source, enriches the stack
//! catalog from GitHub and StackShare, and emits one page per stack.

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
