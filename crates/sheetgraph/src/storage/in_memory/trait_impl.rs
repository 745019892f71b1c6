//! GraphStore trait implementation for in-memory storage.

use super::InMemoryStore;
use super::graph::{RawPath, dependents_bfs, edges_in_order, paths_into};
use super::inner::GraphStoreInner;
use crate::domain::{Cell, CellAddress, CellUpdate, Sheet, SpreadsheetSnapshot};
use crate::error::Result;
use crate::storage::{
    CellFilter, Deadline, DependencyPath, DependentSet, EdgeTriple, GraphExport, GraphPattern,
    GraphStore, PatternMatch, RebuildSummary, StoreStats, UpsertSummary, check_deadline,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

#[async_trait]
impl GraphStore for InMemoryStore {
    async fn rebuild(&self, snapshot: &SpreadsheetSnapshot) -> Result<RebuildSummary> {
        let mut inner = self.write().await;
        inner.clear();

        // === Phase 1: Sheets and cells ===
        let shared = bare_addresses_in_several_sheets(snapshot);
        let mut keys: Vec<CellAddress> = Vec::with_capacity(snapshot.cell_count());
        for sheet in &snapshot.sheets {
            inner.sheets.push(Sheet {
                id: sheet.sheet_id.clone(),
                name: sheet.sheet_name.clone(),
            });
            for cell in &sheet.cells {
                let mut address = CellAddress::parse(&cell.address);
                if shared.contains(&address) {
                    address = address.qualified_with(&sheet.sheet_name);
                }
                // A repeated address keeps its last value and formula.
                if inner.put_cell(
                    address.clone(),
                    cell.value.clone(),
                    cell.formula_text.clone(),
                    &sheet.sheet_name,
                ) {
                    keys.push(address);
                }
            }
        }

        // === Phase 2: Edges from the stored formulas, once every node exists ===
        let mut summary = RebuildSummary {
            sheets: inner.sheets.len(),
            cells: inner.cells.len(),
            ..RebuildSummary::default()
        };
        for address in &keys {
            let Some((formula, sheet_name)) = inner
                .cells
                .get(address)
                .and_then(|cell| Some((cell.formula_text.clone()?, cell.sheet_name.clone())))
            else {
                continue;
            };
            let counts = inner.wire_formula(address, &formula, &sheet_name);
            summary.edges += counts.added;
            summary.dangling_references += counts.dangling;
        }

        // === Phase 3: Labels ===
        inner.relabel_all();

        tracing::info!(
            sheets = summary.sheets,
            cells = summary.cells,
            edges = summary.edges,
            dangling = summary.dangling_references,
            "Rebuilt dependency graph"
        );
        Ok(summary)
    }

    async fn upsert_cell(&self, update: CellUpdate) -> Result<UpsertSummary> {
        let mut inner = self.write().await;
        let CellUpdate {
            address,
            value,
            formula_text,
            sheet_name,
        } = update;

        let address = inner.update_key(&address, &sheet_name);
        let created = inner.put_cell(address.clone(), value, formula_text, &sheet_name);
        let edges_removed = inner.remove_incoming_edges(&address);

        let (formula, owner_sheet) = inner
            .cells
            .get(&address)
            .map(|cell| (cell.formula_text.clone(), cell.sheet_name.clone()))
            .unwrap_or_default();
        let counts = match formula {
            Some(formula) => inner.wire_formula(&address, &formula, &owner_sheet),
            None => Default::default(),
        };

        inner.relabel(&address);

        let summary = UpsertSummary {
            created,
            edges_removed,
            edges_added: counts.added,
            dangling_references: counts.dangling,
        };
        tracing::debug!(
            address = %address,
            created = summary.created,
            edges_removed = summary.edges_removed,
            edges_added = summary.edges_added,
            "Upserted cell"
        );
        Ok(summary)
    }

    async fn traverse_dependents(
        &self,
        address: &CellAddress,
        max_depth: usize,
        deadline: Option<Deadline>,
    ) -> Result<Vec<CellAddress>> {
        let inner = self.read().await;
        let Some(start) = inner.locate(address) else {
            return Ok(Vec::new());
        };

        let nodes = dependents_bfs(&inner.graph, start, max_depth, deadline.as_ref())?;
        Ok(nodes
            .into_iter()
            .map(|node| inner.graph[node].clone())
            .collect())
    }

    async fn query(
        &self,
        pattern: &GraphPattern,
        deadline: Option<Deadline>,
    ) -> Result<PatternMatch> {
        let inner = self.read().await;
        let deadline = deadline.as_ref();

        match pattern {
            GraphPattern::Cells { filter, limit } => {
                let cells = matching_cells(&inner, filter, deadline)?;
                Ok(PatternMatch::Cells(
                    cells
                        .into_iter()
                        .take(limit.unwrap_or(usize::MAX))
                        .cloned()
                        .collect(),
                ))
            }
            GraphPattern::Dependents {
                sources,
                max_depth,
                source_limit,
            } => {
                let mut sets = Vec::new();
                for source in matching_cells(&inner, sources, deadline)? {
                    if source_limit.is_some_and(|limit| sets.len() >= limit) {
                        break;
                    }
                    let start = inner.node_map[&source.address];
                    let dependents: Vec<Cell> =
                        dependents_bfs(&inner.graph, start, *max_depth, deadline)?
                            .into_iter()
                            .filter_map(|node| inner.cell_at(node).cloned())
                            .collect();
                    if dependents.is_empty() {
                        continue;
                    }
                    sets.push(DependentSet {
                        source: source.clone(),
                        dependents,
                    });
                }
                Ok(PatternMatch::Dependents(sets))
            }
            GraphPattern::PathsInto { address, max_depth } => {
                let Some(target) = inner.locate(address) else {
                    return Ok(PatternMatch::Paths {
                        target: None,
                        paths: Vec::new(),
                    });
                };
                let paths = paths_into(&inner.graph, target, *max_depth, deadline)?
                    .into_iter()
                    .map(|raw| resolve_path(&inner, raw))
                    .collect();
                Ok(PatternMatch::Paths {
                    target: inner.cell_at(target).cloned(),
                    paths,
                })
            }
            GraphPattern::Edges { limit } => {
                let triples = edges_in_order(&inner.graph, *limit)
                    .into_iter()
                    .filter_map(|edge| {
                        let record = inner.edge_record(edge)?;
                        Some(EdgeTriple {
                            source: inner.cells.get(&record.from)?.clone(),
                            target: inner.cells.get(&record.to)?.clone(),
                            edge: record,
                        })
                    })
                    .collect();
                Ok(PatternMatch::Edges(triples))
            }
        }
    }

    async fn get_cell(&self, address: &CellAddress) -> Result<Option<Cell>> {
        let inner = self.read().await;
        Ok(inner
            .locate(address)
            .and_then(|node| inner.cell_at(node))
            .cloned())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let inner = self.read().await;
        Ok(StoreStats {
            sheets: inner.sheets.len(),
            cells: inner.cells.len(),
            edges: inner.graph.edge_count(),
        })
    }

    async fn export(&self) -> Result<GraphExport> {
        let inner = self.read().await;

        let mut cells: Vec<Cell> = inner.cells.values().cloned().collect();
        cells.sort_by(|a, b| a.address.cmp(&b.address));

        let mut edges: Vec<_> = inner
            .graph
            .edge_indices()
            .filter_map(|edge| inner.edge_record(edge))
            .collect();
        edges.sort_by(|a, b| (&a.from, &a.to, a.id).cmp(&(&b.from, &b.to, b.id)));

        Ok(GraphExport {
            sheets: inner.sheets.clone(),
            cells,
            edges,
        })
    }
}

/// Bare snapshot addresses that occur in more than one sheet.
///
/// These are stored sheet-qualified so every sheet keeps its own cell.
fn bare_addresses_in_several_sheets(snapshot: &SpreadsheetSnapshot) -> HashSet<CellAddress> {
    let mut first_sheet: HashMap<CellAddress, usize> = HashMap::new();
    let mut shared = HashSet::new();
    for (index, sheet) in snapshot.sheets.iter().enumerate() {
        for cell in &sheet.cells {
            let address = CellAddress::parse(&cell.address);
            if address.is_qualified() {
                continue;
            }
            if *first_sheet.entry(address.clone()).or_insert(index) != index {
                shared.insert(address);
            }
        }
    }
    shared
}

/// Cells matching `filter`, sorted by address.
fn matching_cells<'a>(
    inner: &'a GraphStoreInner,
    filter: &CellFilter,
    deadline: Option<&Deadline>,
) -> Result<Vec<&'a Cell>> {
    check_deadline(deadline, 0)?;
    let mut cells: Vec<&Cell> = inner.cells.values().filter(|c| filter.matches(c)).collect();
    cells.sort_by(|a, b| a.address.cmp(&b.address));
    Ok(cells)
}

fn resolve_path(inner: &GraphStoreInner, raw: RawPath) -> DependencyPath {
    DependencyPath {
        nodes: raw
            .nodes
            .into_iter()
            .filter_map(|node| inner.cell_at(node).cloned())
            .collect(),
        edges: raw
            .edges
            .into_iter()
            .filter_map(|edge| inner.edge_record(edge))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{
        CellAddress, CellSnapshot, CellUpdate, FormulaKind, SemanticLabel, SheetSnapshot,
        SpreadsheetSnapshot,
    };
    use crate::storage::{CellFilter, GraphPattern, PatternMatch, new_in_memory_store};

    fn snapshot(cells: Vec<CellSnapshot>) -> SpreadsheetSnapshot {
        SpreadsheetSnapshot {
            sheets: vec![SheetSnapshot {
                sheet_id: "s1".to_string(),
                sheet_name: "Sheet1".to_string(),
                cells,
            }],
        }
    }

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s)
    }

    #[tokio::test]
    async fn test_rebuild_computes_kinds_and_labels() {
        let store = new_in_memory_store();
        store
            .rebuild(&snapshot(vec![
                CellSnapshot::new("B1", Some("Revenue"), None),
                CellSnapshot::new("B2", Some("ORD-12345"), None),
                CellSnapshot::new("B3", Some("12"), Some("=SUM(B2:B2)")),
                CellSnapshot::new("B4", Some("7"), Some("")),
            ]))
            .await
            .unwrap();

        let b1 = store.get_cell(&addr("B1")).await.unwrap().unwrap();
        assert_eq!(b1.semantic_label, Some(SemanticLabel::Header));

        let b2 = store.get_cell(&addr("B2")).await.unwrap().unwrap();
        assert_eq!(b2.semantic_label, Some(SemanticLabel::Id));

        let b3 = store.get_cell(&addr("B3")).await.unwrap().unwrap();
        assert_eq!(b3.formula_kind, FormulaKind::Aggregation);

        let b4 = store.get_cell(&addr("B4")).await.unwrap().unwrap();
        assert_eq!(b4.formula_kind, FormulaKind::None);
        assert!(b4.formula_text.is_none());
    }

    #[tokio::test]
    async fn test_bare_reference_falls_back_to_sheet_qualified() {
        let store = new_in_memory_store();
        let summary = store
            .rebuild(&snapshot(vec![
                CellSnapshot::new("Sheet1!A1", Some("5"), None),
                CellSnapshot::new("Sheet1!A2", None, Some("=A1*2")),
            ]))
            .await
            .unwrap();

        assert_eq!(summary.edges, 1);
        assert_eq!(summary.dangling_references, 0);
        let dependents = store
            .traverse_dependents(&addr("Sheet1!A1"), 10, None)
            .await
            .unwrap();
        assert_eq!(dependents, vec![addr("SHEET1!A2")]);
    }

    #[tokio::test]
    async fn test_upsert_creates_missing_cell() {
        let store = new_in_memory_store();
        store
            .rebuild(&snapshot(vec![CellSnapshot::new("A1", Some("1"), None)]))
            .await
            .unwrap();

        let summary = store
            .upsert_cell(CellUpdate {
                address: addr("A2"),
                value: None,
                formula_text: Some("=A1+1".to_string()),
                sheet_name: "Sheet1".to_string(),
            })
            .await
            .unwrap();

        assert!(summary.created);
        assert_eq!(summary.edges_added, 1);
        assert_eq!(
            store.traverse_dependents(&addr("A1"), 10, None).await.unwrap(),
            vec![addr("A2")]
        );
    }

    #[tokio::test]
    async fn test_cells_pattern_respects_limit() {
        let store = new_in_memory_store();
        store
            .rebuild(&snapshot(vec![
                CellSnapshot::new("A3", Some("3"), None),
                CellSnapshot::new("A1", Some("1"), None),
                CellSnapshot::new("A2", Some("2"), None),
            ]))
            .await
            .unwrap();

        let pattern = GraphPattern::Cells {
            filter: CellFilter::all(),
            limit: Some(2),
        };
        let PatternMatch::Cells(cells) = store.query(&pattern, None).await.unwrap() else {
            panic!("expected cells");
        };
        let addresses: Vec<_> = cells.into_iter().map(|c| c.address).collect();
        assert_eq!(addresses, vec![addr("A1"), addr("A2")]);
    }

    #[tokio::test]
    async fn test_paths_into_unknown_cell_is_empty() {
        let store = new_in_memory_store();
        let pattern = GraphPattern::PathsInto {
            address: addr("Z9"),
            max_depth: 5,
        };
        assert_eq!(
            store.query(&pattern, None).await.unwrap(),
            PatternMatch::Paths {
                target: None,
                paths: Vec::new()
            }
        );
    }
}
