//! Error types for sheetgraph operations.

use crate::domain::CellAddress;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// The error type for sheetgraph operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A formula could not be tokenized.
    ///
    /// The extractor degrades this to an empty dependency list; it only
    /// surfaces from [`crate::formula::try_extract_dependencies`].
    #[error("Malformed formula '{formula}': {reason}")]
    MalformedFormula {
        /// The offending formula text
        formula: String,
        /// What made it unparseable
        reason: String,
    },

    /// A formula referenced a cell that does not exist.
    ///
    /// The store skips such references and logs this error at trace level.
    #[error("Formula in {from} references missing cell {reference}")]
    DanglingReference {
        /// The formula owner
        from: CellAddress,
        /// The unresolved reference
        reference: String,
    },

    /// The query intent has no translation.
    #[error("Query intent not supported: {0}")]
    UnsupportedQuery(String),

    /// The query is structurally invalid (bad operator, missing parameter).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A request named a cell that is not in the graph.
    #[error("Cell not found: {0}")]
    CellNotFound(CellAddress),

    /// The underlying graph storage cannot be reached.
    #[error("Graph store unavailable: {0}")]
    StoreUnavailable(String),

    /// A bounded traversal exceeded its deadline.
    #[error("Traversal exceeded its {budget:?} deadline after visiting {visited} cells")]
    TraversalTimeout {
        /// Time budget that was exceeded
        budget: Duration,
        /// Number of cells visited before aborting
        visited: usize,
    },

    /// The spreadsheet source failed to produce a snapshot.
    #[error("Spreadsheet source error: {0}")]
    Source(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedQuery(_) | Self::InvalidQuery(_) | Self::CellNotFound(_)
        )
    }
}

/// A specialized Result type for sheetgraph operations.
pub type Result<T> = std::result::Result<T, Error>;
