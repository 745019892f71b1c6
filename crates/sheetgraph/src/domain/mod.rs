//! Domain types for the spreadsheet dependency graph.
//!
//! This module contains the core types shared by the extractor, the labeler,
//! the graph store, the change propagator and the query translator.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::formula::normalize_reference;

/// Normalized, optionally sheet-qualified cell address (e.g. `A1`, `SHEET1!B7`).
///
/// The address is the stable identity of a cell node in the graph. Constructing
/// one through [`CellAddress::parse`] applies the same normalization as the
/// reference extractor so that formula references and snapshot addresses meet
/// on the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellAddress(String);

impl CellAddress {
    /// Create an address from an already-normalized string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Normalize raw user or snapshot input into an address.
    pub fn parse(raw: &str) -> Self {
        Self(normalize_reference(raw))
    }

    /// Get the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The sheet qualifier, if any (`SHEET1` for `SHEET1!A1`).
    pub fn sheet_part(&self) -> Option<&str> {
        self.0.split_once('!').map(|(sheet, _)| sheet)
    }

    /// The cell part without any sheet qualifier (`A1` for `SHEET1!A1`).
    pub fn cell_part(&self) -> &str {
        self.0.split_once('!').map_or(self.0.as_str(), |(_, cell)| cell)
    }

    /// Whether the address carries a sheet qualifier.
    pub fn is_qualified(&self) -> bool {
        self.0.contains('!')
    }

    /// Qualify a bare address with the given sheet name.
    ///
    /// Already-qualified addresses are returned unchanged.
    pub fn qualified_with(&self, sheet_name: &str) -> Self {
        if self.is_qualified() {
            return self.clone();
        }
        Self::parse(&format!("{sheet_name}!{}", self.0))
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CellAddress {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for CellAddress {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

/// A logical spreadsheet tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    /// Source-assigned sheet identifier
    pub id: String,

    /// Display name of the tab
    pub name: String,
}

/// Heuristic classification of a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormulaKind {
    /// No formula
    None,

    /// SUM-family aggregation
    Aggregation,

    /// VLOOKUP / HLOOKUP / INDEX
    Lookup,

    /// IF-family conditional
    Conditional,

    /// Plain arithmetic operators
    Arithmetic,

    /// Anything else
    Other,
}

impl FormulaKind {
    /// Stable uppercase name used in query filters and result attributes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Aggregation => "AGGREGATION",
            Self::Lookup => "LOOKUP",
            Self::Conditional => "CONDITIONAL",
            Self::Arithmetic => "ARITHMETIC",
            Self::Other => "OTHER",
        }
    }
}

/// Data type inferred from a cell's raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataKind {
    /// Parses as a floating point number
    Number,

    /// `true` or `false`, any case
    Boolean,

    /// ISO `YYYY-MM-DD` date
    Date,

    /// Any other non-blank text
    Text,
}

impl DataKind {
    /// Infer the data kind of a raw value.
    ///
    /// Checks run in a fixed order: number, boolean, date, text. Blank or
    /// absent values have no data kind.
    pub fn infer(value: Option<&str>) -> Option<Self> {
        let value = value?.trim();
        if value.is_empty() {
            return None;
        }
        if value.parse::<f64>().is_ok() {
            return Some(Self::Number);
        }
        if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
            return Some(Self::Boolean);
        }
        if chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
            return Some(Self::Date);
        }
        Some(Self::Text)
    }

    /// Stable uppercase name used in query filters and result attributes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Number => "NUMBER",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::Text => "TEXT",
        }
    }
}

/// Semantic role inferred for a cell's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SemanticLabel {
    /// First-row cell
    Header,

    /// Identifier or code
    Id,

    /// Short free-text label
    Label,
}

impl SemanticLabel {
    /// Stable uppercase name used in query filters and result attributes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Header => "HEADER",
            Self::Id => "ID",
            Self::Label => "LABEL",
        }
    }
}

/// A cell node in the dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Normalized unique address
    pub address: CellAddress,

    /// Raw value as read from the source
    pub raw_value: Option<String>,

    /// Formula text, absent for literal cells
    pub formula_text: Option<String>,

    /// Heuristic formula classification
    pub formula_kind: FormulaKind,

    /// Inferred data kind of the raw value
    pub data_kind: Option<DataKind>,

    /// Inferred semantic label
    pub semantic_label: Option<SemanticLabel>,

    /// Name of the owning sheet
    pub sheet_name: String,
}

/// Identifier assigned by the store to each DEPENDS_ON edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u64);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// DEPENDS_ON edge payload.
///
/// Direction is `target -> source`: the edge's start cell (the formula
/// owner) depends on the edge's end cell (the referenced cell).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependsOn {
    /// Store-assigned edge identifier
    pub id: EdgeId,

    /// Literal formula text that produced the edge
    pub formula_text: String,
}

/// A fully resolved DEPENDS_ON edge with both endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Store-assigned edge identifier
    pub id: EdgeId,

    /// The dependent cell (formula owner)
    pub from: CellAddress,

    /// The cell being depended upon
    pub to: CellAddress,

    /// Literal formula text that produced the edge
    pub formula_text: String,
}

// ========== Snapshot input ==========

/// A single cell as produced by a spreadsheet source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSnapshot {
    /// Address as written by the source (normalized on import)
    pub address: String,

    /// Raw value
    #[serde(default)]
    pub value: Option<String>,

    /// Formula text, if the cell holds a formula
    #[serde(default, alias = "formula")]
    pub formula_text: Option<String>,
}

impl CellSnapshot {
    /// Convenience constructor used by sources and tests.
    pub fn new(address: &str, value: Option<&str>, formula_text: Option<&str>) -> Self {
        Self {
            address: address.to_string(),
            value: value.map(str::to_string),
            formula_text: formula_text.map(str::to_string),
        }
    }
}

/// One tab of a spreadsheet snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSnapshot {
    /// Source-assigned sheet identifier
    #[serde(default, alias = "id", alias = "sheetId")]
    pub sheet_id: String,

    /// Display name of the tab
    #[serde(alias = "name", alias = "sheetName")]
    pub sheet_name: String,

    /// Cells of the tab
    #[serde(default)]
    pub cells: Vec<CellSnapshot>,
}

/// A complete spreadsheet as consumed by a bulk rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadsheetSnapshot {
    /// Tabs in source order
    #[serde(default)]
    pub sheets: Vec<SheetSnapshot>,
}

impl SpreadsheetSnapshot {
    /// Total number of cells across all sheets.
    pub fn cell_count(&self) -> usize {
        self.sheets.iter().map(|s| s.cells.len()).sum()
    }
}

// ========== Incremental updates ==========

/// A single-cell write applied to the graph without a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    /// Address of the cell to write
    pub address: CellAddress,

    /// New raw value
    pub value: Option<String>,

    /// New formula text, absent for literal cells
    pub formula_text: Option<String>,

    /// Sheet owning the cell
    pub sheet_name: String,
}

/// A live change event for one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellChange {
    /// Address of the changed cell
    #[serde(alias = "cellAddress")]
    pub address: CellAddress,

    /// Value before the change
    #[serde(default)]
    pub old_value: Option<String>,

    /// Value after the change
    #[serde(default)]
    pub new_value: Option<String>,

    /// Formula text after the change
    #[serde(default, alias = "formula")]
    pub formula_text: Option<String>,

    /// Sheet owning the cell
    #[serde(default)]
    pub sheet_name: String,
}

impl CellChange {
    /// The store update this change event implies.
    pub fn to_update(&self) -> CellUpdate {
        CellUpdate {
            address: self.address.clone(),
            value: self.new_value.clone(),
            formula_text: self.formula_text.clone(),
            sheet_name: self.sheet_name.clone(),
        }
    }
}

/// Impact notification produced for a processed change event.
///
/// Serializes to the JSON object handed to the notification transport:
/// `{"changedCell", "oldValue", "newValue", "affectedCells"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactResult {
    /// Address of the changed cell
    pub changed_cell: CellAddress,

    /// Value before the change
    pub old_value: Option<String>,

    /// Value after the change
    pub new_value: Option<String>,

    /// Cells transitively depending on the changed cell, in traversal order
    pub affected_cells: Vec<CellAddress>,
}
