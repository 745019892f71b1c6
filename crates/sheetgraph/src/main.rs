//! Sheetgraph CLI binary.

use anyhow::Result;
use sheetgraph::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Main entry point for the sheetgraph CLI.
///
/// Uses tokio's current_thread runtime; notification sends are spawned onto
/// the same thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Controlled via RUST_LOG, e.g. RUST_LOG=sheetgraph=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sheetgraph=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!("Starting sheetgraph CLI");

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("Sheetgraph CLI completed successfully");
    Ok(())
}
