//! MCP server for sheetgraph.
//!
//! This crate provides an MCP (Model Context Protocol) server that exposes
//! spreadsheet dependency analysis to AI assistants.
//!
//! # Architecture
//!
//! The server uses the `rmcp` crate for MCP protocol handling and wraps a
//! single [`sheetgraph::app::App`] holding one in-memory graph.
//!
//! # Tools
//!
//! ## Graph Management
//! - `analyze` - Build the graph from a spreadsheet snapshot
//! - `status` - Show the loaded spreadsheet and graph size
//!
//! ## Queries
//! - `query` - Ask a natural-language question
//! - `impact` - Trace every dependency path into a cell
//! - `dependents` - List cells depending on a cell
//! - `visualize` - Sample the graph's edges
//!
//! ## Changes
//! - `apply_change` - Apply a cell edit and report its impact

pub mod context;
pub mod error;
pub mod models;
pub mod server;
pub mod tools;

pub use error::{Error, Result};
pub use server::SheetgraphMcpServer;
