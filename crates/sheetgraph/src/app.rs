//! Request API over the dependency graph.
//!
//! The `App` struct wires a store, a snapshot source, an intent classifier
//! and a change propagator together and exposes the request operations used
//! by the CLI and the MCP server. Every operation returns an [`ApiResponse`]:
//! errors are turned into a typed failure payload at this boundary and
//! never propagate past it.
//!
//! # Example
//!
//! ```no_run
//! use sheetgraph::app::App;
//! use sheetgraph::config::SheetgraphConfig;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let app = App::from_config(SheetgraphConfig::default());
//!     let response = app.analyze("budget").await;
//!     println!("{}", serde_json::to_string_pretty(&response).unwrap());
//! }
//! ```

use crate::config::SheetgraphConfig;
use crate::domain::{CellAddress, CellChange, SpreadsheetSnapshot};
use crate::error::{Error, Result};
use crate::intent::{IntentClassifier, KeywordClassifier};
use crate::notify::{Broadcaster, NotificationTransport};
use crate::propagator::{ChangePropagator, PropagationOutcome};
use crate::query::{
    self, CELL_ID_PARAMETER, GraphSample, ImpactAnalysisResult, Intent, ParsedQuery, QueryAnswer,
    SemanticQuery,
};
use crate::source::{JsonSnapshotSource, SpreadsheetSource};
use crate::storage::{
    Deadline, GraphExport, GraphPattern, GraphStore, PatternMatch, RebuildSummary, StoreStats,
    new_in_memory_store,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Who is at fault for a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The request itself was wrong
    Client,
    /// The system could not serve a valid request
    Server,
    /// A traversal ran out of time
    Timeout,
}

impl From<&Error> for FailureKind {
    fn from(err: &Error) -> Self {
        match err {
            Error::TraversalTimeout { .. } => Self::Timeout,
            e if e.is_client_error() => Self::Client,
            _ => Self::Server,
        }
    }
}

/// Outcome of a request: a payload or a typed failure with an explanation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiResponse<T> {
    /// The request succeeded
    Success {
        /// Response payload
        data: T,
    },
    /// The request failed
    Failure {
        /// Failure category
        kind: FailureKind,
        /// Human-readable explanation
        message: String,
    },
}

impl<T> ApiResponse<T> {
    /// Convert an operation result, logging failures.
    pub fn from_result(operation: &str, result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::Success { data },
            Err(e) => {
                let kind = FailureKind::from(&e);
                tracing::warn!(operation, kind = ?kind, error = %e, "Request failed");
                Self::Failure {
                    kind,
                    message: format!("{operation} failed: {e}"),
                }
            }
        }
    }

    /// Whether the request succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The payload, if the request succeeded.
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    /// The failure category, if the request failed.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Result of building the graph from a spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    /// The analyzed spreadsheet
    pub spreadsheet_id: String,
    /// Status message
    pub message: String,
    /// Node and edge counts produced
    pub summary: RebuildSummary,
}

/// Application context for request handling.
pub struct App {
    store: Arc<dyn GraphStore>,
    source: Arc<dyn SpreadsheetSource>,
    classifier: Arc<dyn IntentClassifier>,
    propagator: Arc<ChangePropagator>,
    broadcaster: Option<Arc<Broadcaster>>,
    config: SheetgraphConfig,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("store", &"<dyn GraphStore>")
            .field("source", &"<dyn SpreadsheetSource>")
            .finish_non_exhaustive()
    }
}

impl App {
    /// Create an App with an empty in-memory store, a JSON snapshot source
    /// rooted at `config.snapshot_dir`, keyword classification and an
    /// in-process broadcaster.
    pub fn from_config(config: SheetgraphConfig) -> Self {
        let broadcaster = Arc::new(Broadcaster::new(config.notify_timeout()));
        let source = Arc::new(JsonSnapshotSource::new(config.snapshot_dir.clone()));
        let mut app = Self::with_parts(
            config,
            new_in_memory_store(),
            source,
            Arc::new(KeywordClassifier),
            broadcaster.clone(),
        );
        app.broadcaster = Some(broadcaster);
        app
    }

    /// Create an App from explicit collaborators.
    pub fn with_parts(
        config: SheetgraphConfig,
        store: Arc<dyn GraphStore>,
        source: Arc<dyn SpreadsheetSource>,
        classifier: Arc<dyn IntentClassifier>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        let propagator = ChangePropagator::new(store.clone(), transport)
            .with_impact_depth(config.impact_depth)
            .with_traversal_timeout(config.query_timeout());
        Self {
            store,
            source,
            classifier,
            propagator: Arc::new(propagator),
            broadcaster: None,
            config,
        }
    }

    /// The shared store.
    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// The change propagator, e.g. for [`ChangePropagator::spawn_listener`].
    pub fn propagator(&self) -> &Arc<ChangePropagator> {
        &self.propagator
    }

    /// The in-process broadcaster, when the App owns one.
    pub fn broadcaster(&self) -> Option<&Arc<Broadcaster>> {
        self.broadcaster.as_ref()
    }

    /// The active configuration.
    pub fn config(&self) -> &SheetgraphConfig {
        &self.config
    }

    fn deadline(&self) -> Option<Deadline> {
        Some(Deadline::after(self.config.query_timeout()))
    }

    // ========== Request operations ==========

    /// Read a spreadsheet from the source and rebuild the graph from it.
    pub async fn analyze(&self, spreadsheet_id: &str) -> ApiResponse<AnalysisReport> {
        let result = async {
            let snapshot = self.source.read(spreadsheet_id).await?;
            self.rebuild(spreadsheet_id, &snapshot).await
        }
        .await;
        ApiResponse::from_result("Analysis", result)
    }

    /// Rebuild the graph from a snapshot already in hand.
    pub async fn analyze_snapshot(
        &self,
        spreadsheet_id: &str,
        snapshot: &SpreadsheetSnapshot,
    ) -> ApiResponse<AnalysisReport> {
        ApiResponse::from_result("Analysis", self.rebuild(spreadsheet_id, snapshot).await)
    }

    async fn rebuild(
        &self,
        spreadsheet_id: &str,
        snapshot: &SpreadsheetSnapshot,
    ) -> Result<AnalysisReport> {
        let summary = self.store.rebuild(snapshot).await?;
        Ok(AnalysisReport {
            spreadsheet_id: spreadsheet_id.to_string(),
            message: "Knowledge graph built successfully".to_string(),
            summary,
        })
    }

    /// Classify, translate and run a natural-language query.
    pub async fn query(&self, query: SemanticQuery) -> ApiResponse<QueryAnswer> {
        ApiResponse::from_result("Query execution", self.run_query(query).await)
    }

    async fn run_query(&self, query: SemanticQuery) -> Result<QueryAnswer> {
        let parsed = self
            .classifier
            .classify(&query.query)
            .into_parsed(query.parameters);
        self.execute(&parsed).await
    }

    /// Run an already-structured query.
    pub async fn query_parsed(&self, parsed: &ParsedQuery) -> ApiResponse<QueryAnswer> {
        ApiResponse::from_result("Query execution", self.execute(parsed).await)
    }

    async fn execute(&self, parsed: &ParsedQuery) -> Result<QueryAnswer> {
        let plan = query::translate(parsed, &self.config.translate_options())?;
        query::execute(self.store.as_ref(), &plan, self.deadline()).await
    }

    /// Every dependency path leading into a cell.
    ///
    /// A cell that does not exist, or that nothing depends on, yields an
    /// empty result with an explanation rather than a failure.
    pub async fn impact(&self, cell: &str) -> ApiResponse<ImpactAnalysisResult> {
        let parsed = ParsedQuery::new(Intent::ImpactAnalysis)
            .with_parameter(CELL_ID_PARAMETER, Value::from(cell));
        let result = match self.execute(&parsed).await {
            Ok(QueryAnswer::Impact(impact)) => Ok(impact),
            Ok(QueryAnswer::Entities(_)) => Err(Error::StoreUnavailable(
                "impact query produced an entity listing".to_string(),
            )),
            Err(e) => Err(e),
        };
        ApiResponse::from_result("Impact analysis", result)
    }

    /// Cells transitively depending on a cell.
    ///
    /// An unknown cell is a client failure; a known cell with no dependents
    /// succeeds with an empty list.
    pub async fn dependents(&self, cell: &str, max_depth: usize) -> ApiResponse<Vec<CellAddress>> {
        let address = CellAddress::parse(cell);
        let result = async {
            if self.store.get_cell(&address).await?.is_none() {
                return Err(Error::CellNotFound(address));
            }
            self.store
                .traverse_dependents(&address, max_depth, self.deadline())
                .await
        }
        .await;
        ApiResponse::from_result("Dependency traversal", result)
    }

    /// A capped sample of the whole graph.
    pub async fn visualize(&self) -> ApiResponse<GraphSample> {
        let limit = self.config.visualize_edge_limit;
        let result = async {
            match self
                .store
                .query(&GraphPattern::Edges { limit: Some(limit) }, self.deadline())
                .await?
            {
                PatternMatch::Edges(triples) => Ok(GraphSample::from_triples(&triples, limit)),
                other => Err(Error::StoreUnavailable(format!(
                    "store answered an edges pattern with {} matches",
                    other.name()
                ))),
            }
        }
        .await;
        ApiResponse::from_result("Visualization", result)
    }

    /// Apply a live change event and return its impact.
    pub async fn apply_change(&self, change: CellChange) -> ApiResponse<PropagationOutcome> {
        ApiResponse::from_result("Change propagation", self.propagator.process(change).await)
    }

    /// Node and edge counts.
    pub async fn stats(&self) -> ApiResponse<StoreStats> {
        ApiResponse::from_result("Stats", self.store.stats().await)
    }

    /// The full graph in a stable order.
    pub async fn export(&self) -> ApiResponse<GraphExport> {
        ApiResponse::from_result("Export", self.store.export().await)
    }
}
