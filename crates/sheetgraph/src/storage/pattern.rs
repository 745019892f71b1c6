//! Store-level retrieval patterns and their match payloads.
//!
//! A [`GraphPattern`] is the parameterized form of a graph question. The
//! query translator builds one from a parsed query, and every backend
//! answers it with a [`PatternMatch`]. Filter operands are bound values,
//! never spliced text.

use crate::domain::{Cell, CellAddress, DependencyEdge};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Comparison operator used by cell predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// `=` or `==`
    #[serde(rename = "=", alias = "==")]
    Eq,
    /// `!=`
    #[serde(rename = "!=")]
    Ne,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `>=`
    #[serde(rename = ">=")]
    Ge,
    /// `<=`
    #[serde(rename = "<=")]
    Le,
}

impl ComparisonOp {
    /// Parse an operator token (`=`, `==`, `!=`, `>`, `<`, `>=`, `<=`).
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "=" | "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }

    /// Canonical operator token.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }

    /// Whether `lhs <op> rhs` holds for the given ordering of `lhs` to `rhs`.
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Lt => ordering == Ordering::Less,
            Self::Ge => ordering != Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cell attribute addressable by a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellField {
    /// Normalized address
    Address,
    /// Raw value
    Value,
    /// Formula text
    FormulaText,
    /// Formula classification
    FormulaKind,
    /// Inferred data kind
    DataKind,
    /// Inferred semantic label
    SemanticLabel,
    /// Owning sheet name
    SheetName,
}

impl CellField {
    /// Parse a field name as written in queries.
    ///
    /// Accepts snake_case and camelCase spellings plus a few short aliases
    /// (`id`, `formula`, `label`, `sheet`). Matching is case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "address" | "id" | "cellid" | "cell_id" => Some(Self::Address),
            "value" | "raw_value" | "rawvalue" => Some(Self::Value),
            "formula" | "formula_text" | "formulatext" => Some(Self::FormulaText),
            "formula_kind" | "formulakind" | "formulatype" | "formula_type" => {
                Some(Self::FormulaKind)
            }
            "data_kind" | "datakind" | "datatype" | "data_type" => Some(Self::DataKind),
            "semantic_label" | "semanticlabel" | "label" => Some(Self::SemanticLabel),
            "sheet" | "sheet_name" | "sheetname" => Some(Self::SheetName),
            _ => None,
        }
    }

    /// Read this attribute from a cell. Absent attributes are `None`.
    ///
    /// A formula kind of `NONE` counts as absent.
    pub fn read(self, cell: &Cell) -> Option<String> {
        match self {
            Self::Address => Some(cell.address.to_string()),
            Self::Value => cell.raw_value.clone(),
            Self::FormulaText => cell.formula_text.clone(),
            Self::FormulaKind => match cell.formula_kind {
                crate::domain::FormulaKind::None => None,
                kind => Some(kind.as_str().to_string()),
            },
            Self::DataKind => cell.data_kind.map(|k| k.as_str().to_string()),
            Self::SemanticLabel => cell.semantic_label.map(|l| l.as_str().to_string()),
            Self::SheetName => Some(cell.sheet_name.clone()),
        }
    }
}

/// Bound operand of a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Numeric operand
    Number(f64),
    /// Text operand
    Text(String),
}

impl FilterValue {
    /// The operand as a number, parsing text operands.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// The operand rendered as text.
    pub fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// One conjunct of a [`CellFilter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellPredicate {
    /// Numeric comparison on the raw value.
    ///
    /// Only values that are present, contain no ASCII letters and parse as a
    /// number take part; any other value fails the predicate.
    NumericValue {
        /// Operator
        op: ComparisonOp,
        /// Right-hand side
        operand: f64,
    },

    /// Comparison on any attribute.
    ///
    /// Numeric when both sides parse as numbers, otherwise case-insensitive
    /// text comparison. Absent attributes fail the predicate.
    Attribute {
        /// Attribute to compare
        field: CellField,
        /// Operator
        op: ComparisonOp,
        /// Right-hand side
        operand: FilterValue,
    },

    /// The address. A bare address also matches that cell on any sheet.
    AddressIs(CellAddress),

    /// The semantic label, lowercased, is one of the given names.
    LabelIn(Vec<String>),
}

impl CellPredicate {
    /// Evaluate the predicate against a cell.
    pub fn matches(&self, cell: &Cell) -> bool {
        match self {
            Self::NumericValue { op, operand } => numeric_value(cell)
                .and_then(|v| v.partial_cmp(operand))
                .is_some_and(|ordering| op.holds(ordering)),
            Self::Attribute { field, op, operand } => {
                let Some(actual) = field.read(cell) else {
                    return false;
                };
                compare_attribute(&actual, operand).is_some_and(|ordering| op.holds(ordering))
            }
            Self::AddressIs(address) => {
                &cell.address == address
                    || (!address.is_qualified() && cell.address.cell_part() == address.as_str())
            }
            Self::LabelIn(labels) => cell
                .semantic_label
                .is_some_and(|label| labels.iter().any(|l| l == &label.as_str().to_lowercase())),
        }
    }
}

/// The raw value as a number, if it is numeric-looking.
fn numeric_value(cell: &Cell) -> Option<f64> {
    let value = cell.raw_value.as_deref()?.trim();
    if value.is_empty() || value.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    value.parse().ok()
}

fn compare_attribute(actual: &str, operand: &FilterValue) -> Option<Ordering> {
    if let (Ok(lhs), Some(rhs)) = (actual.trim().parse::<f64>(), operand.as_number()) {
        return lhs.partial_cmp(&rhs);
    }
    Some(
        actual
            .to_lowercase()
            .cmp(&operand.as_text().to_lowercase()),
    )
}

/// Conjunction of cell predicates. An empty filter matches every cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellFilter {
    /// Predicates that must all hold
    pub predicates: Vec<CellPredicate>,
}

impl CellFilter {
    /// A filter matching every cell.
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter matching a single address.
    pub fn address(address: CellAddress) -> Self {
        Self {
            predicates: vec![CellPredicate::AddressIs(address)],
        }
    }

    /// Add a predicate.
    #[must_use]
    pub fn and(mut self, predicate: CellPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Whether every predicate holds for the cell.
    pub fn matches(&self, cell: &Cell) -> bool {
        self.predicates.iter().all(|p| p.matches(cell))
    }
}

/// A store retrieval pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum GraphPattern {
    /// Cells matching a filter, ordered by address.
    Cells {
        /// Cell filter
        filter: CellFilter,
        /// Maximum number of cells returned
        limit: Option<usize>,
    },

    /// For each source cell, the cells transitively depending on it.
    ///
    /// Sources without dependents are omitted. `source_limit` caps the
    /// number of reported sources.
    Dependents {
        /// Which cells act as sources
        sources: CellFilter,
        /// Traversal depth bound
        max_depth: usize,
        /// Maximum number of sources reported
        source_limit: Option<usize>,
    },

    /// Every DEPENDS_ON path of one to `max_depth` edges leading into a cell.
    ///
    /// No edge repeats within a path, so cycles yield finitely many paths.
    PathsInto {
        /// The cell the paths lead into
        address: CellAddress,
        /// Maximum path length in edges
        max_depth: usize,
    },

    /// DEPENDS_ON edges with both endpoint cells, in creation order.
    Edges {
        /// Maximum number of edges returned
        limit: Option<usize>,
    },
}

impl GraphPattern {
    /// Short name for logging and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cells { .. } => "cells",
            Self::Dependents { .. } => "dependents",
            Self::PathsInto { .. } => "paths_into",
            Self::Edges { .. } => "edges",
        }
    }
}

/// A source cell and its transitive dependents in BFS order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependentSet {
    /// The cell depended upon
    pub source: Cell,
    /// Cells depending on it, nearest first
    pub dependents: Vec<Cell>,
}

/// A chain of DEPENDS_ON edges walked backward from a cell.
///
/// `nodes[0]` is the cell the path leads into and the last node is the
/// furthest dependent. `edges[i]` runs from `nodes[i + 1]` to `nodes[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyPath {
    /// Cells along the path
    pub nodes: Vec<Cell>,
    /// Edges along the path
    pub edges: Vec<DependencyEdge>,
}

impl DependencyPath {
    /// Number of edges in the path.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the path has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// An edge together with its endpoint cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeTriple {
    /// The dependent cell
    pub source: Cell,
    /// The edge
    pub edge: DependencyEdge,
    /// The cell depended upon
    pub target: Cell,
}

/// Result of answering a [`GraphPattern`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern", content = "matches", rename_all = "snake_case")]
pub enum PatternMatch {
    /// Answer to [`GraphPattern::Cells`]
    Cells(Vec<Cell>),

    /// Answer to [`GraphPattern::Dependents`]
    Dependents(Vec<DependentSet>),

    /// Answer to [`GraphPattern::PathsInto`]
    Paths {
        /// The target cell, absent when it does not exist
        target: Option<Cell>,
        /// Paths into the target
        paths: Vec<DependencyPath>,
    },

    /// Answer to [`GraphPattern::Edges`]
    Edges(Vec<EdgeTriple>),
}

impl PatternMatch {
    /// Short name for logging and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cells(_) => "cells",
            Self::Dependents(_) => "dependents",
            Self::Paths { .. } => "paths_into",
            Self::Edges(_) => "edges",
        }
    }
}
