//! CLI argument parsing and command dispatch.
//!
//! The graph lives in memory, so every invocation first loads a spreadsheet:
//! either a snapshot file given with `--snapshot`, or a spreadsheet id read
//! from the configured snapshot directory with `--spreadsheet`.
//!
//! # Commands
//!
//! - `analyze`: Build the graph from a spreadsheet and report counts
//! - `stats`: Show node and edge counts
//! - `query`: Ask a natural-language question
//! - `impact`: Trace every path leading into a cell
//! - `dependents`: List cells depending on a cell
//! - `visualize`: Show a capped sample of the graph
//! - `change`: Apply a live change and report its impact
//! - `export`: Dump the full graph as JSON
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//! - `--config`: Configuration file (default `sheetgraph.yaml`)
//!
//! # Example
//!
//! ```bash
//! sheetgraph analyze budget
//! sheetgraph --snapshot budget.json impact A1
//! sheetgraph --snapshot budget.json query "show cells where value > 100"
//! sheetgraph --spreadsheet budget change A1 150
//! ```

mod args;
mod execute;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use args::{AnalyzeArgs, ChangeArgs, DependentsArgs, ImpactArgs, QueryArgs, validate_cell};

use crate::app::{ApiResponse, App};
use crate::config::{CONFIG_FILE_NAME, SheetgraphConfig};
use crate::output::OutputMode;
use crate::source::JsonSnapshotSource;

/// Sheetgraph - a live dependency graph over spreadsheet formulas
///
/// Builds a graph of which cells depend on which from formula text, keeps it
/// current as cells change, and answers impact and dependency questions.
#[derive(Parser, Debug)]
#[command(name = "sheetgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Load the graph from this snapshot file
    #[arg(long, global = true, conflicts_with = "spreadsheet")]
    pub snapshot: Option<PathBuf>,

    /// Load the graph from `<snapshot-dir>/<id>.json`
    #[arg(long, global = true)]
    pub spreadsheet: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the graph from a spreadsheet
    ///
    /// Reads the spreadsheet from the snapshot directory, rebuilds the graph
    /// from scratch and reports sheet, cell and edge counts.
    Analyze(AnalyzeArgs),

    /// Show graph statistics
    Stats,

    /// Ask a natural-language question
    ///
    /// The question is classified by keyword into a find, dependency or
    /// impact query. Filters like `value > 100` are picked up from the text.
    Query(QueryArgs),

    /// Trace every dependency path leading into a cell
    Impact(ImpactArgs),

    /// List the cells depending on a cell
    Dependents(DependentsArgs),

    /// Show a capped sample of the graph
    Visualize,

    /// Apply a cell change and report its impact
    ///
    /// The change is applied to the loaded graph only; nothing is written back.
    Change(ChangeArgs),

    /// Dump the full graph as JSON
    Export,
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        let Some(command) = &self.command else {
            println!("Sheetgraph spreadsheet dependency graph");
            println!("Use --help for more information");
            return Ok(());
        };

        let config = SheetgraphConfig::load_or_default(&self.config)
            .await
            .with_context(|| format!("Failed to load {}", self.config.display()))?;
        let app = App::from_config(config);

        if let Commands::Analyze(args) = command {
            return execute::execute_analyze(&app, args, output_mode).await;
        }
        self.load_graph(&app).await?;

        match command {
            Commands::Analyze(_) => Ok(()),
            Commands::Stats => execute::execute_stats(&app, output_mode).await,
            Commands::Query(args) => execute::execute_query(&app, args, output_mode).await,
            Commands::Impact(args) => execute::execute_impact(&app, args, output_mode).await,
            Commands::Dependents(args) => {
                execute::execute_dependents(&app, args, output_mode).await
            }
            Commands::Visualize => execute::execute_visualize(&app, output_mode).await,
            Commands::Change(args) => execute::execute_change(&app, args, output_mode).await,
            Commands::Export => execute::execute_export(&app).await,
        }
    }

    /// Populate the app's store from `--snapshot` or `--spreadsheet`.
    async fn load_graph(&self, app: &App) -> Result<()> {
        let response = match (&self.snapshot, &self.spreadsheet) {
            (Some(path), _) => {
                let snapshot = JsonSnapshotSource::read_file(path)
                    .await
                    .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                app.analyze_snapshot(&name, &snapshot).await
            }
            (None, Some(id)) => app.analyze(id).await,
            (None, None) => {
                anyhow::bail!("No graph loaded: pass --snapshot <FILE> or --spreadsheet <ID>")
            }
        };
        match response {
            ApiResponse::Success { data } => {
                tracing::debug!(
                    spreadsheet = %data.spreadsheet_id,
                    cells = data.summary.cells,
                    edges = data.summary.edges,
                    "Loaded graph"
                );
                Ok(())
            }
            ApiResponse::Failure { message, .. } => anyhow::bail!("{message}"),
        }
    }
}
