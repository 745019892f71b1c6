//! MCP tool implementations.
//!
//! Each tool forwards to the shared [`App`](sheetgraph::app::App) and turns
//! its [`ApiResponse`] into a `Result`.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::models::StatusResponse;
use serde_json::{Map, Value};
use sheetgraph::app::{AnalysisReport, ApiResponse};
use sheetgraph::domain::{CellAddress, CellChange};
use sheetgraph::propagator::PropagationOutcome;
use sheetgraph::query::{GraphSample, ImpactAnalysisResult, QueryAnswer, SemanticQuery};
use std::sync::Arc;
use tokio::sync::RwLock;

fn into_result<T>(response: ApiResponse<T>) -> Result<T> {
    match response {
        ApiResponse::Success { data } => Ok(data),
        ApiResponse::Failure { kind, message } => Err(Error::Request { kind, message }),
    }
}

/// Tool implementations for the sheetgraph MCP server.
pub struct Tools {
    context: Arc<RwLock<Context>>,
}

impl Tools {
    /// Create a new Tools instance with the given context.
    pub fn new(context: Arc<RwLock<Context>>) -> Self {
        Self { context }
    }

    /// Build the graph from a spreadsheet, replacing any previous graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the spreadsheet cannot be read or the rebuild fails.
    pub async fn analyze(&self, spreadsheet_id: &str) -> Result<AnalysisReport> {
        let mut context = self.context.write().await;
        let report = into_result(context.app().analyze(spreadsheet_id).await)?;
        context.set_spreadsheet(spreadsheet_id);
        Ok(report)
    }

    /// Answer a natural-language question.
    ///
    /// # Errors
    ///
    /// Returns an error if no graph is loaded or the query is unsupported or invalid.
    pub async fn query(
        &self,
        query: String,
        parameters: Option<Map<String, Value>>,
    ) -> Result<QueryAnswer> {
        let context = self.context.read().await;
        let app = context.loaded_app()?;
        into_result(
            app.query(SemanticQuery {
                query,
                parameters: parameters.unwrap_or_default(),
            })
            .await,
        )
    }

    /// Trace every dependency path leading into a cell.
    ///
    /// # Errors
    ///
    /// Returns an error if no graph is loaded or the traversal fails.
    pub async fn impact(&self, cell_id: &str) -> Result<ImpactAnalysisResult> {
        let context = self.context.read().await;
        into_result(context.loaded_app()?.impact(cell_id).await)
    }

    /// List cells transitively depending on a cell.
    ///
    /// # Errors
    ///
    /// Returns an error if no graph is loaded or the traversal fails.
    pub async fn dependents(&self, cell_id: &str, max_depth: Option<usize>) -> Result<Vec<String>> {
        let context = self.context.read().await;
        let app = context.loaded_app()?;
        let depth = max_depth.unwrap_or(app.config().query_depth);
        let addresses = into_result(app.dependents(cell_id, depth).await)?;
        Ok(addresses.into_iter().map(|a| a.to_string()).collect())
    }

    /// A capped sample of the graph.
    ///
    /// # Errors
    ///
    /// Returns an error if no graph is loaded or the store fails.
    pub async fn visualize(&self) -> Result<GraphSample> {
        let context = self.context.read().await;
        into_result(context.loaded_app()?.visualize().await)
    }

    /// Apply a live cell change and return its impact.
    ///
    /// Works on an empty graph too: the changed cell is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn apply_change(
        &self,
        cell_id: &str,
        old_value: Option<String>,
        new_value: Option<String>,
        formula: Option<String>,
        sheet_name: Option<String>,
    ) -> Result<PropagationOutcome> {
        let context = self.context.read().await;
        let change = CellChange {
            address: CellAddress::parse(cell_id),
            old_value,
            new_value,
            formula_text: formula,
            sheet_name: sheet_name.unwrap_or_default(),
        };
        into_result(context.app().apply_change(change).await)
    }

    /// Which spreadsheet is loaded and how large the graph is.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn status(&self) -> Result<StatusResponse> {
        let context = self.context.read().await;
        let stats = into_result(context.app().stats().await)?;
        Ok(StatusResponse::new(context.spreadsheet_id(), stats))
    }
}
