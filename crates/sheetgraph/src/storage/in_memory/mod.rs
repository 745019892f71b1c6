//! In-memory storage backend using HashMap and petgraph.
//!
//! All data is held in RAM and lost when the process exits. A snapshot is
//! reloaded with [`GraphStore::rebuild`](crate::storage::GraphStore::rebuild).
//!
//! # Architecture
//!
//! - `HashMap<CellAddress, Cell>` for O(1) cell lookups
//! - `petgraph::DiGraph` holding the DEPENDS_ON edges
//! - `HashMap<CellAddress, NodeIndex>` mapping cells to graph nodes
//! - A monotonic counter assigning [`EdgeId`](crate::domain::EdgeId)s
//!
//! ## Edge Direction Convention
//!
//! Edges point from **dependent -> dependency**:
//!
//! - **Edge source**: the formula owner
//! - **Edge target**: the referenced cell
//! - **Edge weight**: [`DependsOn`](crate::domain::DependsOn) with the edge id and formula text
//!
//! For `A3 = A1 + A2` the graph holds `A3 -> A1` and `A3 -> A2`. The
//! dependents of `A1` are found by walking incoming edges.
//!
//! Nodes are only removed by a rebuild, so node indices stay valid between
//! rebuilds. Edge indices shift when edges are removed, which is why edges
//! carry their own ids.
//!
//! # Thread Safety
//!
//! The inner state sits behind a `tokio::sync::RwLock`. Writes hold the write
//! lock for their whole duration; traversals and reads share the read lock.
//!
//! # Performance Characteristics
//!
//! - Rebuild: O(c + r) for c cells and r formula references
//! - Upsert: O(d + r) for d incoming edges and r references
//! - Traverse dependents: O(n + e) within the depth bound
//! - Paths into a cell: exponential in the depth bound on dense graphs; bounded by the deadline

mod graph;
mod inner;
mod trait_impl;

use crate::storage::GraphStore;
use inner::GraphStoreInner;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe in-memory store.
///
/// Implements [`GraphStore`] via the trait implementation in `trait_impl.rs`.
pub(crate) type InMemoryStore = RwLock<GraphStoreInner>;

/// Create a new empty in-memory store.
///
/// # Example
///
/// ```
/// use sheetgraph::storage::in_memory::new_in_memory_store;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let store = new_in_memory_store();
///     assert_eq!(store.stats().await.unwrap().cells, 0);
/// }
/// ```
pub fn new_in_memory_store() -> Arc<dyn GraphStore> {
    Arc::new(InMemoryStore::new(GraphStoreInner::new()))
}
