//! Dependency graph storage.
//!
//! This module provides the [`GraphStore`] trait, the authoritative graph of
//! sheets, cells and DEPENDS_ON edges, and the in-memory petgraph backend.
//!
//! # Architecture
//!
//! The trait is async and object-safe. Implementations synchronize
//! internally, so every method takes `&self` and one store is shared as an
//! `Arc<dyn GraphStore>` between the request API, the change propagator and
//! any number of concurrent readers.
//!
//! - `rebuild` and `upsert_cell` are exclusive for their whole duration
//! - `traverse_dependents`, `query` and the read accessors run concurrently
//!
//! Readers therefore observe the graph either before or after a write, never
//! with a half-updated edge list.
//!
//! # Test Utilities
//!
//! With the `test-util` feature enabled, [`UnavailableStore`] is exported:
//! a backend that fails every call with [`Error::StoreUnavailable`], for
//! exercising failure paths.
//!
//! # Example
//!
//! ```
//! use sheetgraph::domain::{CellAddress, CellSnapshot, SheetSnapshot, SpreadsheetSnapshot};
//! use sheetgraph::storage::new_in_memory_store;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> sheetgraph::error::Result<()> {
//!     let store = new_in_memory_store();
//!     let snapshot = SpreadsheetSnapshot {
//!         sheets: vec![SheetSnapshot {
//!             sheet_id: "s1".to_string(),
//!             sheet_name: "Sheet1".to_string(),
//!             cells: vec![
//!                 CellSnapshot::new("A1", Some("5"), None),
//!                 CellSnapshot::new("A2", None, Some("=A1*2")),
//!             ],
//!         }],
//!     };
//!
//!     let summary = store.rebuild(&snapshot).await?;
//!     assert_eq!(summary.edges, 1);
//!
//!     let dependents = store
//!         .traverse_dependents(&CellAddress::parse("A1"), 10, None)
//!         .await?;
//!     assert_eq!(dependents, vec![CellAddress::parse("A2")]);
//!     Ok(())
//! }
//! ```

use crate::domain::{Cell, CellAddress, CellUpdate, DependencyEdge, Sheet, SpreadsheetSnapshot};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub mod in_memory;
mod pattern;

pub use pattern::{
    CellField, CellFilter, CellPredicate, ComparisonOp, DependencyPath, DependentSet, EdgeTriple,
    FilterValue, GraphPattern, PatternMatch,
};

/// A point in time after which a traversal gives up.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
    budget: Duration,
}

impl Deadline {
    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
            budget,
        }
    }

    /// The total budget this deadline was created with.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Fail with [`Error::TraversalTimeout`] if the deadline has passed.
    ///
    /// `visited` is reported in the error to show how far the traversal got.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TraversalTimeout`] once the deadline has passed.
    pub fn check(&self, visited: usize) -> Result<()> {
        if self.is_expired() {
            return Err(Error::TraversalTimeout {
                budget: self.budget,
                visited,
            });
        }
        Ok(())
    }
}

/// Check an optional deadline.
pub(crate) fn check_deadline(deadline: Option<&Deadline>, visited: usize) -> Result<()> {
    deadline.map_or(Ok(()), |d| d.check(visited))
}

/// Outcome of a bulk rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildSummary {
    /// Sheets created
    pub sheets: usize,
    /// Cells created
    pub cells: usize,
    /// DEPENDS_ON edges created
    pub edges: usize,
    /// References skipped because no such cell exists
    pub dangling_references: usize,
}

/// Outcome of a single-cell update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertSummary {
    /// Whether the cell did not exist before
    pub created: bool,
    /// Edges pointing into the cell that were deleted
    pub edges_removed: usize,
    /// Edges created from the new formula
    pub edges_added: usize,
    /// References in the new formula with no matching cell
    pub dangling_references: usize,
}

/// Node and edge counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of sheets
    pub sheets: usize,
    /// Number of cells
    pub cells: usize,
    /// Number of DEPENDS_ON edges
    pub edges: usize,
}

/// Full dump of the store.
///
/// Sheets are in snapshot order, cells are sorted by address and edges by
/// (from, to, id), so two dumps of equal graphs compare equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    /// All sheets
    pub sheets: Vec<Sheet>,
    /// All cells
    pub cells: Vec<Cell>,
    /// All DEPENDS_ON edges
    pub edges: Vec<DependencyEdge>,
}

/// Core storage trait for the dependency graph.
///
/// # Method Categories
///
/// - **Writes**: `rebuild`, `upsert_cell`
/// - **Traversal**: `traverse_dependents`, `query`
/// - **Reads**: `get_cell`, `stats`, `export`
///
/// # Error Handling
///
/// - `StoreUnavailable`: the backend cannot be reached
/// - `TraversalTimeout`: a traversal passed its [`Deadline`]
///
/// Dangling formula references are never errors; they are counted in the
/// write summaries and skipped.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ========== Writes ==========

    /// Replace the whole graph with the contents of a snapshot.
    ///
    /// Clears everything, creates one sheet per tab and one cell per snapshot
    /// cell, then one DEPENDS_ON edge per formula reference that resolves to
    /// an existing cell, then labels every cell.
    ///
    /// A backend that fails midway may leave a partial graph; there is no
    /// rollback across a failed rebuild.
    async fn rebuild(&self, snapshot: &SpreadsheetSnapshot) -> Result<RebuildSummary>;

    /// Write a single cell without rebuilding.
    ///
    /// Creates the cell if absent and overwrites its value, formula, kinds
    /// and label. Every DEPENDS_ON edge pointing into the cell is deleted,
    /// then outgoing edges are created from the new formula. Edges the cell
    /// produced from an earlier formula are kept.
    async fn upsert_cell(&self, update: CellUpdate) -> Result<UpsertSummary>;

    // ========== Traversal ==========

    /// Cells transitively depending on `address`, up to `max_depth` hops.
    ///
    /// Follows DEPENDS_ON edges backward in BFS order. Each address appears
    /// once and the start address is never included, so cycles terminate.
    /// Unknown addresses and `max_depth == 0` yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns `Error::TraversalTimeout` if the deadline passes first.
    async fn traverse_dependents(
        &self,
        address: &CellAddress,
        max_depth: usize,
        deadline: Option<Deadline>,
    ) -> Result<Vec<CellAddress>>;

    /// Answer a retrieval pattern.
    ///
    /// The returned [`PatternMatch`] variant always corresponds to the
    /// pattern variant.
    ///
    /// # Errors
    ///
    /// Returns `Error::TraversalTimeout` if the deadline passes first.
    async fn query(&self, pattern: &GraphPattern, deadline: Option<Deadline>)
    -> Result<PatternMatch>;

    // ========== Reads ==========

    /// Get a cell by address. Returns `None` if it doesn't exist.
    async fn get_cell(&self, address: &CellAddress) -> Result<Option<Cell>>;

    /// Node and edge counts.
    async fn stats(&self) -> Result<StoreStats>;

    /// Dump the whole graph in a stable order.
    async fn export(&self) -> Result<GraphExport>;
}

/// Create an empty in-memory store.
pub fn new_in_memory_store() -> Arc<dyn GraphStore> {
    in_memory::new_in_memory_store()
}

/// A backend whose every call fails with [`Error::StoreUnavailable`].
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone, Default)]
#[non_exhaustive]
pub struct UnavailableStore {
    reason: String,
}

#[cfg(any(test, feature = "test-util"))]
impl UnavailableStore {
    /// Create a store failing with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> Result<T> {
        Err(Error::StoreUnavailable(self.reason.clone()))
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl GraphStore for UnavailableStore {
    async fn rebuild(&self, _snapshot: &SpreadsheetSnapshot) -> Result<RebuildSummary> {
        self.fail()
    }

    async fn upsert_cell(&self, _update: CellUpdate) -> Result<UpsertSummary> {
        self.fail()
    }

    async fn traverse_dependents(
        &self,
        _address: &CellAddress,
        _max_depth: usize,
        _deadline: Option<Deadline>,
    ) -> Result<Vec<CellAddress>> {
        self.fail()
    }

    async fn query(
        &self,
        _pattern: &GraphPattern,
        _deadline: Option<Deadline>,
    ) -> Result<PatternMatch> {
        self.fail()
    }

    async fn get_cell(&self, _address: &CellAddress) -> Result<Option<Cell>> {
        self.fail()
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.fail()
    }

    async fn export(&self) -> Result<GraphExport> {
        self.fail()
    }
}
