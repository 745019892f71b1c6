//! Semantic query translation and execution.
//!
//! A [`ParsedQuery`] (intent, filters, concepts, parameters) is translated
//! into a [`QueryPlan`] wrapping a store [`GraphPattern`], executed against
//! a [`GraphStore`], and the raw matches are mapped into typed results.
//!
//! | Intent                 | Pattern                 | Result                   |
//! |------------------------|-------------------------|--------------------------|
//! | `FIND_ENTITIES`        | `Cells`                 | [`QueryResult`]          |
//! | `ANALYZE_DEPENDENCIES` | `Dependents`            | [`QueryResult`]          |
//! | `IMPACT_ANALYSIS`      | `PathsInto`             | [`ImpactAnalysisResult`] |
//! | `GENERAL_QUERY`        | none, `UnsupportedQuery`|                          |

mod plan;
mod result;

pub use plan::{
    CELL_ID_PARAMETER, DEFAULT_QUERY_DEPTH, DEFAULT_SOURCE_LIMIT, QueryPlan, TranslateOptions,
    VALUE_PARAMETER, translate,
};
pub use result::{
    CELL_ENTITY_TYPE, DEPENDS_ON, Entity, GraphSample, ImpactAnalysisResult, NO_IMPACT_EXPLANATION,
    QueryResult, Relationship,
};

use crate::domain::CellAddress;
use crate::error::{Error, Result};
use crate::storage::{Deadline, GraphPattern, GraphStore, PatternMatch};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// The classified purpose of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    /// Find cells matching attribute filters
    FindEntities,
    /// List cells depending on a cell or concept
    AnalyzeDependencies,
    /// Trace every path that leads into a cell
    ImpactAnalysis,
    /// Anything else; not executable
    GeneralQuery,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FindEntities => "FIND_ENTITIES",
            Self::AnalyzeDependencies => "ANALYZE_DEPENDENCIES",
            Self::ImpactAnalysis => "IMPACT_ANALYSIS",
            Self::GeneralQuery => "GENERAL_QUERY",
        };
        f.write_str(name)
    }
}

/// A `field operator value` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    /// Cell attribute name
    pub field: String,
    /// Comparison operator token
    pub operator: String,
    /// Right-hand side
    pub value: Value,
}

/// A structured query, as produced by an intent classifier plus request parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    /// What the query asks for
    pub intent: Intent,
    /// Filters keyed by field; a later filter on the same field replaces an earlier one
    #[serde(default)]
    pub filters: BTreeMap<String, QueryFilter>,
    /// Business concepts mentioned
    #[serde(default)]
    pub concepts: Vec<String>,
    /// Request parameters such as `cellId` and `value`
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ParsedQuery {
    /// An empty query with the given intent.
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            filters: BTreeMap::new(),
            concepts: Vec::new(),
            parameters: Map::new(),
        }
    }

    /// Add a filter, replacing any filter on the same field.
    #[must_use]
    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filters.insert(filter.field.clone(), filter);
        self
    }

    /// Set a request parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: &str, value: Value) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }

    /// The normalized `cellId` parameter, if present.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidQuery` when `cellId` is present but not a string.
    pub fn cell_id(&self) -> Result<Option<CellAddress>> {
        match self.parameters.get(CELL_ID_PARAMETER) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(CellAddress::parse(s))),
            Some(other) => Err(Error::InvalidQuery(format!(
                "parameter 'cellId' must be a string, got {other}"
            ))),
        }
    }
}

/// A natural-language query as submitted to the request API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticQuery {
    /// The question text
    pub query: String,
    /// Explicit parameters such as `cellId`
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// The answer to an executed plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryAnswer {
    /// Answer to a find or dependency query
    Entities(QueryResult),
    /// Answer to an impact query
    Impact(ImpactAnalysisResult),
}

/// Run a plan against a store and map the matches.
///
/// # Errors
///
/// Propagates store errors, including `Error::TraversalTimeout`.
pub async fn execute(
    store: &dyn GraphStore,
    plan: &QueryPlan,
    deadline: Option<Deadline>,
) -> Result<QueryAnswer> {
    let matches = store.query(&plan.pattern, deadline).await?;

    match (&plan.pattern, matches) {
        (GraphPattern::Cells { .. }, PatternMatch::Cells(cells)) => {
            let mut metadata = plan_metadata(plan);
            metadata.insert("count".to_string(), Value::from(cells.len()));
            Ok(QueryAnswer::Entities(QueryResult {
                entities: cells.iter().map(Entity::from).collect(),
                relationships: Vec::new(),
                explanation: format!(
                    "Query executed based on semantic filters: {}",
                    plan.description
                ),
                metadata,
            }))
        }
        (GraphPattern::Dependents { max_depth, .. }, PatternMatch::Dependents(sets)) => {
            let mut seen = HashSet::new();
            let mut entities = Vec::new();
            let mut dependents = Map::new();
            for set in &sets {
                let ids: Vec<Value> = set
                    .dependents
                    .iter()
                    .map(|c| Value::from(c.address.as_str()))
                    .collect();
                dependents.insert(set.source.address.to_string(), Value::Array(ids));
                for cell in std::iter::once(&set.source).chain(&set.dependents) {
                    if seen.insert(cell.address.clone()) {
                        entities.push(Entity::from(cell));
                    }
                }
            }

            let mut metadata = plan_metadata(plan);
            metadata.insert("maxDepth".to_string(), Value::from(*max_depth));
            metadata.insert("dependents".to_string(), Value::Object(dependents));
            Ok(QueryAnswer::Entities(QueryResult {
                entities,
                relationships: Vec::new(),
                explanation: format!(
                    "Found {} source cells with dependents ({})",
                    sets.len(),
                    plan.description
                ),
                metadata,
            }))
        }
        (GraphPattern::PathsInto { address, .. }, PatternMatch::Paths { target, paths }) => {
            let source = target.as_ref().map(Entity::from);
            if paths.is_empty() {
                return Ok(QueryAnswer::Impact(ImpactAnalysisResult::no_impact(source)));
            }
            Ok(QueryAnswer::Impact(ImpactAnalysisResult {
                source,
                explanation: format!("{} dependency paths lead into {address}", paths.len()),
                paths: paths.iter().map(QueryResult::from_path).collect(),
            }))
        }
        (GraphPattern::Edges { .. }, PatternMatch::Edges(triples)) => {
            let relationships = triples.iter().map(|t| Relationship::from(&t.edge)).collect();
            let mut seen = HashSet::new();
            let entities = triples
                .iter()
                .flat_map(|t| [&t.source, &t.target])
                .filter(|c| seen.insert(c.address.clone()))
                .map(Entity::from)
                .collect();
            Ok(QueryAnswer::Entities(QueryResult {
                entities,
                relationships,
                explanation: format!("Listed {} edges", triples.len()),
                metadata: Map::new(),
            }))
        }
        (pattern, matches) => Err(Error::StoreUnavailable(format!(
            "store answered a {} pattern with {} matches",
            pattern.name(),
            matches.name()
        ))),
    }
}

fn plan_metadata(plan: &QueryPlan) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("intent".to_string(), Value::from(plan.intent.to_string()));
    if !plan.parameters.is_empty() {
        metadata.insert(
            "parameters".to_string(),
            Value::Object(plan.parameters.clone()),
        );
    }
    metadata
}
