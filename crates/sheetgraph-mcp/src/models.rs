//! MCP request parameters and response models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sheetgraph::storage::StoreStats;

/// Parameters for the `analyze` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeParams {
    /// Spreadsheet to build the graph from.
    pub spreadsheet_id: String,
}

/// Parameters for the `query` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryParams {
    /// Natural-language question, e.g. "show cells where value > 100".
    pub query: String,

    /// Explicit parameters such as `cellId` or `value`.
    #[serde(default)]
    pub parameters: Option<Map<String, Value>>,
}

/// Parameters for the `impact` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImpactParams {
    /// Cell whose dependents to trace, e.g. "A1" or "Sheet2!B3".
    pub cell_id: String,
}

/// Parameters for the `dependents` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DependentsParams {
    /// Cell whose dependents to list.
    pub cell_id: String,

    /// Maximum traversal depth (default: the configured query depth).
    pub max_depth: Option<usize>,
}

/// Parameters for the `apply_change` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApplyChangeParams {
    /// Cell being written.
    pub cell_id: String,

    /// Value before the change.
    pub old_value: Option<String>,

    /// Value after the change.
    pub new_value: Option<String>,

    /// Formula after the change, e.g. "=A1*2".
    pub formula: Option<String>,

    /// Sheet owning the cell.
    pub sheet_name: Option<String>,
}

/// Response from the `status` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusResponse {
    /// Spreadsheet the graph was last built from, if any.
    pub spreadsheet_id: Option<String>,

    /// Whether a graph has been loaded.
    pub graph_loaded: bool,

    /// Sheet count.
    pub sheets: usize,

    /// Cell count.
    pub cells: usize,

    /// Edge count.
    pub edges: usize,
}

impl StatusResponse {
    /// Combine the loaded spreadsheet id with store counts.
    pub fn new(spreadsheet_id: Option<&str>, stats: StoreStats) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.map(str::to_string),
            graph_loaded: spreadsheet_id.is_some(),
            sheets: stats.sheets,
            cells: stats.cells,
            edges: stats.edges,
        }
    }
}
