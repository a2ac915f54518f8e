//! fsdgen CLI: turn functional design documents into functional specs.
//!
//! Splits an FDD into numbered sections, remaps them onto the FSD outline,
//! and generates each FSD section with an LLM.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
