//! Core in-memory storage data structures.
//!
//! This module contains the inner storage structure that holds all data
//! and is wrapped in a `RwLock` for thread safety.

use crate::domain::{Cell, CellAddress, DataKind, DependencyEdge, DependsOn, EdgeId, Sheet};
use crate::error::Error;
use crate::formula::{analyze_formula_kind, extract_dependencies, normalize_sheet_name};
use crate::labeler::{SheetContext, infer_label};
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// Inner storage structure (not thread-safe).
///
/// Edges are directed from **dependent to dependency**. See the module-level
/// documentation of `in_memory` for the full convention.
pub(crate) struct GraphStoreInner {
    /// Sheets in snapshot order
    pub(super) sheets: Vec<Sheet>,

    /// Cells indexed by address for O(1) lookups
    pub(super) cells: HashMap<CellAddress, Cell>,

    /// Dependency graph. Nodes hold addresses, edges hold [`DependsOn`].
    pub(super) graph: DiGraph<CellAddress, DependsOn>,

    /// Mapping from address to graph node.
    ///
    /// Every cell in `self.cells` has an entry here.
    pub(super) node_map: HashMap<CellAddress, NodeIndex>,

    /// Next edge id to hand out
    next_edge_id: u64,
}

/// Edge counts produced by wiring one formula.
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct EdgeCounts {
    pub(super) added: usize,
    pub(super) dangling: usize,
}

impl GraphStoreInner {
    /// Create a new empty storage instance
    pub(crate) fn new() -> Self {
        Self {
            sheets: Vec::new(),
            cells: HashMap::new(),
            graph: DiGraph::new(),
            node_map: HashMap::new(),
            next_edge_id: 1,
        }
    }

    /// Drop every sheet, cell and edge and restart edge numbering.
    pub(super) fn clear(&mut self) {
        *self = Self::new();
    }

    fn allocate_edge_id(&mut self) -> EdgeId {
        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;
        id
    }

    /// Create or overwrite a cell record. Returns `true` if the cell is new.
    ///
    /// The semantic label is left untouched; callers label once the cell's
    /// edges are in place. An empty `sheet_name` keeps the existing one.
    pub(super) fn put_cell(
        &mut self,
        address: CellAddress,
        value: Option<String>,
        formula_text: Option<String>,
        sheet_name: &str,
    ) -> bool {
        let formula_text = formula_text.filter(|f| !f.trim().is_empty());
        let formula_kind = analyze_formula_kind(formula_text.as_deref());
        let data_kind = DataKind::infer(value.as_deref());

        if let Some(cell) = self.cells.get_mut(&address) {
            cell.raw_value = value;
            cell.formula_text = formula_text;
            cell.formula_kind = formula_kind;
            cell.data_kind = data_kind;
            if !sheet_name.is_empty() {
                cell.sheet_name = sheet_name.to_string();
            }
            return false;
        }

        let node = self.graph.add_node(address.clone());
        self.node_map.insert(address.clone(), node);
        self.cells.insert(
            address.clone(),
            Cell {
                address,
                raw_value: value,
                formula_text,
                formula_kind,
                data_kind,
                semantic_label: None,
                sheet_name: sheet_name.to_string(),
            },
        );
        true
    }

    /// Re-infer the semantic label of one cell.
    pub(super) fn relabel(&mut self, address: &CellAddress) {
        if let Some(cell) = self.cells.get_mut(address) {
            let label = infer_label(
                &cell.address,
                cell.raw_value.as_deref(),
                SheetContext {
                    sheet_name: &cell.sheet_name,
                },
            );
            cell.semantic_label = label;
        }
    }

    /// Re-infer the semantic label of every cell.
    pub(super) fn relabel_all(&mut self) {
        for cell in self.cells.values_mut() {
            let label = infer_label(
                &cell.address,
                cell.raw_value.as_deref(),
                SheetContext {
                    sheet_name: &cell.sheet_name,
                },
            );
            cell.semantic_label = label;
        }
    }

    /// Find the node a formula reference points at.
    ///
    /// References resolve within a sheet: a bare reference belongs to the
    /// owning cell's sheet, a qualified one to the sheet it names. The cell
    /// may be stored under either its bare or its sheet-qualified address.
    /// An empty owner sheet accepts any bare match.
    pub(super) fn resolve_reference(&self, reference: &str, sheet_name: &str) -> Option<NodeIndex> {
        let address = CellAddress::new(reference);
        let (sheet_key, bare) = match address.sheet_part() {
            Some(sheet) => (sheet.to_string(), CellAddress::new(address.cell_part())),
            None => (normalize_sheet_name(sheet_name), address.clone()),
        };

        if let Some(&node) = self.node_map.get(&address)
            && (address.is_qualified() || self.in_sheet(&address, &sheet_key))
        {
            return Some(node);
        }
        if !sheet_key.is_empty()
            && let Some(&node) = self.node_map.get(&bare.qualified_with(&sheet_key))
        {
            return Some(node);
        }
        if address.is_qualified() && self.in_sheet(&bare, &sheet_key) {
            return self.node_map.get(&bare).copied();
        }
        None
    }

    /// Find the node for an address given by a caller.
    ///
    /// Exact matches win. A bare address stored sheet-qualified is looked up
    /// in each sheet in snapshot order.
    pub(super) fn locate(&self, address: &CellAddress) -> Option<NodeIndex> {
        if let Some(&node) = self.node_map.get(address) {
            return Some(node);
        }
        if address.is_qualified() {
            return self.resolve_reference(address.as_str(), "");
        }
        self.sheets.iter().find_map(|sheet| {
            self.node_map
                .get(&address.qualified_with(&sheet.name))
                .copied()
        })
    }

    /// The address an update for `address` on `sheet_name` is stored under.
    ///
    /// A bare address that already belongs to another sheet gets qualified
    /// so the two cells stay apart.
    pub(super) fn update_key(&self, address: &CellAddress, sheet_name: &str) -> CellAddress {
        if address.is_qualified() || sheet_name.is_empty() {
            return self
                .locate(address)
                .map_or_else(|| address.clone(), |node| self.graph[node].clone());
        }
        let qualified = address.qualified_with(sheet_name);
        if self.node_map.contains_key(&qualified)
            || (self.node_map.contains_key(address)
                && !self.in_sheet(address, &normalize_sheet_name(sheet_name)))
        {
            return qualified;
        }
        address.clone()
    }

    /// Whether the cell at `address` exists and sits on the sheet `sheet_key`.
    ///
    /// Cells without a sheet, and an empty `sheet_key`, match any sheet.
    fn in_sheet(&self, address: &CellAddress, sheet_key: &str) -> bool {
        self.cells.get(address).is_some_and(|cell| {
            sheet_key.is_empty()
                || cell.sheet_name.is_empty()
                || normalize_sheet_name(&cell.sheet_name) == sheet_key
        })
    }

    /// Create one DEPENDS_ON edge per resolvable reference in `formula`.
    ///
    /// Repeated references create repeated edges. The owner must exist.
    pub(super) fn wire_formula(
        &mut self,
        owner: &CellAddress,
        formula: &str,
        sheet_name: &str,
    ) -> EdgeCounts {
        let mut counts = EdgeCounts::default();
        let Some(&from) = self.node_map.get(owner) else {
            return counts;
        };

        for reference in extract_dependencies(Some(formula)) {
            let Some(to) = self.resolve_reference(&reference, sheet_name) else {
                let skipped = Error::DanglingReference {
                    from: owner.clone(),
                    reference,
                };
                tracing::trace!(error = %skipped, "Skipping reference");
                counts.dangling += 1;
                continue;
            };
            let id = self.allocate_edge_id();
            self.graph.add_edge(
                from,
                to,
                DependsOn {
                    id,
                    formula_text: formula.to_string(),
                },
            );
            counts.added += 1;
        }
        counts
    }

    /// Delete every edge pointing into `address`. Returns how many were removed.
    pub(super) fn remove_incoming_edges(&mut self, address: &CellAddress) -> usize {
        let Some(&node) = self.node_map.get(address) else {
            return 0;
        };

        let mut doomed: Vec<EdgeIndex> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| edge.id())
            .collect();

        // remove_edge swaps the last edge into the freed slot, so go from the top
        doomed.sort_unstable_by(|a, b| b.cmp(a));
        for edge in &doomed {
            self.graph.remove_edge(*edge);
        }
        doomed.len()
    }

    /// Resolve an edge index into a full edge record.
    pub(super) fn edge_record(&self, edge: EdgeIndex) -> Option<DependencyEdge> {
        let (from, to) = self.graph.edge_endpoints(edge)?;
        let weight = self.graph.edge_weight(edge)?;
        Some(DependencyEdge {
            id: weight.id,
            from: self.graph[from].clone(),
            to: self.graph[to].clone(),
            formula_text: weight.formula_text.clone(),
        })
    }

    /// The cell stored at a graph node.
    pub(super) fn cell_at(&self, node: NodeIndex) -> Option<&Cell> {
        self.graph
            .node_weight(node)
            .and_then(|address| self.cells.get(address))
    }
}
