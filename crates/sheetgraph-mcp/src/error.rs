//! Error types for the sheetgraph MCP server.

use sheetgraph::app::FailureKind;
use thiserror::Error;

/// Errors that can occur in the sheetgraph MCP server.
#[derive(Debug, Error)]
pub enum Error {
    /// No spreadsheet has been analyzed yet.
    #[error("No graph loaded. Call analyze first.")]
    NoGraph,

    /// A request failed inside sheetgraph.
    #[error("{message}")]
    Request {
        /// Who is at fault.
        kind: FailureKind,
        /// Human-readable explanation.
        message: String,
    },

    /// An error from the sheetgraph library outside a request.
    #[error("Sheetgraph error: {0}")]
    Sheetgraph(#[from] sheetgraph::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the caller, rather than the server, is at fault.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::NoGraph => true,
            Self::Request { kind, .. } => *kind == FailureKind::Client,
            Self::Sheetgraph(e) => e.is_client_error(),
            Self::Io(_) | Self::Json(_) => false,
        }
    }
}

/// Result type for sheetgraph MCP operations.
pub type Result<T> = std::result::Result<T, Error>;
