use anyhow::Result;
use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging from core crate
    ctxpack_core::logging::init()?;

    // Parse CLI arguments
    let parsed = cli::Cli::parse();

    // Dispatch to CLI handler
    parsed.dispatch().await?;

    Ok(())
}
