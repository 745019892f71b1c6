//! Typed query results.
//!
//! Raw store matches are mapped into [`Entity`] and [`Relationship`] records.
//! Addresses become entity ids, attributes are copied as-is, and attributes a
//! cell does not have are left out of the JSON rather than sent as empty
//! strings.

use crate::domain::{Cell, DependencyEdge, FormulaKind};
use crate::storage::{DependencyPath, EdgeTriple};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Explanation attached to an impact analysis that found no dependents.
pub const NO_IMPACT_EXPLANATION: &str = "No impact on other cell.";

/// Entity type of every cell entity.
pub const CELL_ENTITY_TYPE: &str = "Cell";

/// Relationship type of every DEPENDS_ON relationship.
pub const DEPENDS_ON: &str = "DEPENDS_ON";

/// A graph node in a query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Cell address
    pub id: String,

    /// Node kind, always `Cell`
    pub entity_type: String,

    /// Raw value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Formula text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    /// Formula classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_type: Option<String>,

    /// Semantic label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_label: Option<String>,

    /// Data kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    /// Owning sheet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

impl From<&Cell> for Entity {
    fn from(cell: &Cell) -> Self {
        Self {
            id: cell.address.to_string(),
            entity_type: CELL_ENTITY_TYPE.to_string(),
            value: cell.raw_value.clone(),
            formula: cell.formula_text.clone(),
            formula_type: match cell.formula_kind {
                FormulaKind::None => None,
                kind => Some(kind.as_str().to_string()),
            },
            semantic_label: cell.semantic_label.map(|l| l.as_str().to_string()),
            data_type: cell.data_kind.map(|k| k.as_str().to_string()),
            sheet: Some(cell.sheet_name.clone()).filter(|s| !s.is_empty()),
        }
    }
}

/// A graph edge in a query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Store-assigned edge id
    pub id: String,

    /// Address of the dependent cell
    pub source_entity_id: String,

    /// Address of the cell depended upon
    pub target_entity_id: String,

    /// Edge kind, always `DEPENDS_ON`
    pub relationship_type: String,

    /// Formula text that produced the edge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

impl From<&DependencyEdge> for Relationship {
    fn from(edge: &DependencyEdge) -> Self {
        Self {
            id: edge.id.to_string(),
            source_entity_id: edge.from.to_string(),
            target_entity_id: edge.to.to_string(),
            relationship_type: DEPENDS_ON.to_string(),
            formula: Some(edge.formula_text.clone()).filter(|f| !f.is_empty()),
        }
    }
}

/// Entities and relationships answering a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Matched nodes
    pub entities: Vec<Entity>,

    /// Matched edges
    #[serde(default)]
    pub relationships: Vec<Relationship>,

    /// Human-readable account of what was run
    pub explanation: String,

    /// Extra structured detail
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl QueryResult {
    /// The entities and relationships along one path.
    pub fn from_path(path: &DependencyPath) -> Self {
        Self {
            entities: path.nodes.iter().map(Entity::from).collect(),
            relationships: path.edges.iter().map(Relationship::from).collect(),
            explanation: String::new(),
            metadata: Map::new(),
        }
    }
}

/// Answer to an impact analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactAnalysisResult {
    /// The analyzed cell, absent when it does not exist
    pub source: Option<Entity>,

    /// Every dependency path leading into the cell
    pub paths: Vec<QueryResult>,

    /// Human-readable summary
    pub explanation: String,
}

impl ImpactAnalysisResult {
    /// The explanatory empty result.
    pub fn no_impact(source: Option<Entity>) -> Self {
        Self {
            source,
            paths: Vec::new(),
            explanation: NO_IMPACT_EXPLANATION.to_string(),
        }
    }

    /// Addresses reachable from the source through any path, nearest first.
    pub fn affected_cells(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let source = self.source.as_ref().map(|s| s.id.as_str());
        self.paths
            .iter()
            .filter_map(|p| p.entities.last())
            .map(|e| e.id.clone())
            .filter(|id| Some(id.as_str()) != source && seen.insert(id.clone()))
            .collect()
    }
}

/// A capped sample of the whole graph, one segment per edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSample {
    /// Edge segments: both endpoint entities and the relationship
    pub paths: Vec<QueryResult>,

    /// Human-readable summary
    pub explanation: String,
}

impl GraphSample {
    /// Build a sample from store edge triples.
    pub fn from_triples(triples: &[EdgeTriple], limit: usize) -> Self {
        let paths = triples
            .iter()
            .map(|triple| QueryResult {
                entities: vec![Entity::from(&triple.source), Entity::from(&triple.target)],
                relationships: vec![Relationship::from(&triple.edge)],
                explanation: String::new(),
                metadata: Map::new(),
            })
            .collect::<Vec<_>>();
        let explanation = format!("Showing {} of at most {limit} edges", paths.len());
        Self { paths, explanation }
    }
}
