//! Sheetgraph MCP server binary.
//!
//! This binary runs the MCP server using stdio transport. Configuration is
//! read from `sheetgraph.yaml` in the working directory, or from the path in
//! `SHEETGRAPH_CONFIG`.

use sheetgraph::config::{CONFIG_FILE_NAME, SheetgraphConfig};
use sheetgraph_mcp::SheetgraphMcpServer;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting sheetgraph-mcp server");

    let config_path = std::env::var_os("SHEETGRAPH_CONFIG")
        .map_or_else(|| PathBuf::from(CONFIG_FILE_NAME), PathBuf::from);
    let config = SheetgraphConfig::load_or_default(&config_path).await?;

    let server = SheetgraphMcpServer::new(config);
    server.run().await?;

    Ok(())
}
