//! Integration tests for the in-memory graph store.

use rstest::rstest;
use sheetgraph::domain::{CellAddress, CellUpdate, FormulaKind, SemanticLabel};
use sheetgraph::Error;
use sheetgraph::storage::{
    CellFilter, Deadline, GraphPattern, GraphStore, PatternMatch, new_in_memory_store,
};
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{budget, sheet, snapshot};

fn addr(s: &str) -> CellAddress {
    CellAddress::parse(s)
}

fn addrs(list: &[CellAddress]) -> Vec<&str> {
    list.iter().map(CellAddress::as_str).collect()
}

#[tokio::test]
async fn test_rebuild_is_idempotent() {
    let store = new_in_memory_store();
    let first = store.rebuild(&budget()).await.unwrap();
    let export_first = store.export().await.unwrap();

    let second = store.rebuild(&budget()).await.unwrap();
    let export_second = store.export().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(export_first, export_second);
    assert_eq!(export_second.cells.len(), 5);
    assert_eq!(export_second.edges.len(), 3);
}

#[tokio::test]
async fn test_rebuild_replaces_previous_graph() {
    let store = new_in_memory_store();
    store.rebuild(&budget()).await.unwrap();
    store
        .rebuild(&snapshot(vec![sheet("Other", &[("Z1", Some("1"), None)])]))
        .await
        .unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!((stats.sheets, stats.cells, stats.edges), (1, 1, 0));
    assert!(store.get_cell(&addr("A1")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_dangling_reference_is_skipped() {
    let store = new_in_memory_store();
    let summary = store
        .rebuild(&snapshot(vec![sheet(
            "Sheet1",
            &[("A1", Some("5"), None), ("A2", None, Some("=A1+Z9"))],
        )]))
        .await
        .unwrap();

    assert_eq!(summary.edges, 1);
    assert_eq!(summary.dangling_references, 1);
    let export = store.export().await.unwrap();
    assert_eq!(export.edges.len(), 1);
    assert_eq!(export.edges[0].from, addr("A2"));
    assert_eq!(export.edges[0].to, addr("A1"));
    assert!(store.get_cell(&addr("Z9")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_cells_are_classified_on_rebuild() {
    let store = new_in_memory_store();
    store
        .rebuild(&snapshot(vec![sheet(
            "Sheet1",
            &[
                ("A1", Some("Revenue"), None),
                ("A2", Some("100"), None),
                ("B2", Some("Q1 growth"), None),
                ("C2", None, Some("=SUM(A2:A3)")),
            ],
        )]))
        .await
        .unwrap();

    let header = store.get_cell(&addr("A1")).await.unwrap().unwrap();
    assert_eq!(header.semantic_label, Some(SemanticLabel::Header));

    let total = store.get_cell(&addr("C2")).await.unwrap().unwrap();
    assert_eq!(total.formula_kind, FormulaKind::Aggregation);
}

#[tokio::test]
async fn test_cycle_traversal_terminates() {
    let store = new_in_memory_store();
    store
        .rebuild(&snapshot(vec![sheet(
            "Sheet1",
            &[("A1", None, Some("=A2")), ("A2", None, Some("=A1"))],
        )]))
        .await
        .unwrap();

    let dependents = store.traverse_dependents(&addr("A1"), 10, None).await.unwrap();
    assert_eq!(addrs(&dependents), vec!["A2"]);
}

#[rstest]
#[case::zero_depth(0, vec![])]
#[case::one_hop(1, vec!["A3"])]
#[case::two_hops(2, vec!["A3", "B1"])]
#[tokio::test]
async fn test_traversal_depth_bound(#[case] depth: usize, #[case] expected: Vec<&str>) {
    let store = new_in_memory_store();
    store.rebuild(&budget()).await.unwrap();

    let dependents = store.traverse_dependents(&addr("A1"), depth, None).await.unwrap();
    assert_eq!(addrs(&dependents), expected);
}

#[tokio::test]
async fn test_traversal_of_unknown_cell_is_empty() {
    let store = new_in_memory_store();
    store.rebuild(&budget()).await.unwrap();
    assert!(
        store
            .traverse_dependents(&addr("Q42"), 5, None)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_expired_deadline_times_out() {
    let store = new_in_memory_store();
    store.rebuild(&budget()).await.unwrap();

    let deadline = Deadline::after(Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(5)).await;
    let err = store
        .traverse_dependents(&addr("A1"), 5, Some(deadline))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TraversalTimeout { .. }));
}

#[tokio::test]
async fn test_upsert_removes_edges_into_changed_cell() {
    let store = new_in_memory_store();
    store.rebuild(&budget()).await.unwrap();

    let summary = store
        .upsert_cell(CellUpdate {
            address: addr("A3"),
            value: Some("10".to_string()),
            formula_text: None,
            sheet_name: "Sheet1".to_string(),
        })
        .await
        .unwrap();

    // B1 -> A3 pointed into A3; A3's own edges to A1 and A2 remain.
    assert!(!summary.created);
    assert_eq!(summary.edges_removed, 1);
    assert_eq!(summary.edges_added, 0);
    assert_eq!(store.stats().await.unwrap().edges, 2);
    assert!(
        store
            .traverse_dependents(&addr("A3"), 5, None)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_upsert_creates_missing_cell_with_edges() {
    let store = new_in_memory_store();
    store.rebuild(&budget()).await.unwrap();

    let summary = store
        .upsert_cell(CellUpdate {
            address: addr("d1"),
            value: None,
            formula_text: Some("=B1-A1".to_string()),
            sheet_name: "Sheet1".to_string(),
        })
        .await
        .unwrap();

    assert!(summary.created);
    assert_eq!(summary.edges_added, 2);
    let dependents = store.traverse_dependents(&addr("A1"), 5, None).await.unwrap();
    assert_eq!(addrs(&dependents), vec!["A3", "D1", "B1"]);
}

#[rstest]
#[case::qualified_snapshot_address("Data!A1")]
#[case::bare_snapshot_address("A1")]
#[tokio::test]
async fn test_cross_sheet_reference_resolves(#[case] data_address: &str) {
    let store = new_in_memory_store();
    let summary = store
        .rebuild(&snapshot(vec![
            sheet("Data", &[(data_address, Some("7"), None)]),
            sheet("Report", &[("B1", None, Some("=Data!A1*2"))]),
        ]))
        .await
        .unwrap();
    assert_eq!(summary.edges, 1);
    assert_eq!(summary.dangling_references, 0);
}

#[tokio::test]
async fn test_bare_reference_stays_on_owning_sheet() {
    let store = new_in_memory_store();
    let summary = store
        .rebuild(&snapshot(vec![
            sheet("Data", &[("A1", Some("7"), None)]),
            sheet("Report", &[("B2", None, Some("=A1"))]),
        ]))
        .await
        .unwrap();

    // Report has no A1 of its own.
    assert_eq!(summary.edges, 0);
    assert_eq!(summary.dangling_references, 1);
}

#[tokio::test]
async fn test_sheets_sharing_bare_addresses_keep_their_own_cells() {
    let store = new_in_memory_store();
    let summary = store
        .rebuild(&snapshot(vec![
            sheet(
                "Sheet1",
                &[("A1", Some("100"), None), ("A2", None, Some("=A1*2"))],
            ),
            sheet(
                "Sheet2",
                &[("A1", Some("Revenue"), None), ("A2", Some("7"), None)],
            ),
        ]))
        .await
        .unwrap();
    assert_eq!(
        (summary.sheets, summary.cells, summary.edges),
        (2, 4, 1)
    );

    let export = store.export().await.unwrap();
    assert_eq!(export.edges.len(), 1);
    assert_eq!(export.edges[0].from, addr("Sheet1!A2"));
    assert_eq!(export.edges[0].to, addr("Sheet1!A1"));

    let literal = store.get_cell(&addr("Sheet2!A2")).await.unwrap().unwrap();
    assert_eq!(literal.raw_value.as_deref(), Some("7"));
    assert!(literal.formula_text.is_none());
    assert_eq!(literal.sheet_name, "Sheet2");
    assert!(
        store
            .traverse_dependents(&addr("Sheet2!A1"), 5, None)
            .await
            .unwrap()
            .is_empty()
    );

    // A bare lookup finds the first sheet holding the address.
    let dependents = store.traverse_dependents(&addr("A1"), 5, None).await.unwrap();
    assert_eq!(addrs(&dependents), vec!["SHEET1!A2"]);
}

#[tokio::test]
async fn test_upsert_on_shared_address_targets_named_sheet() {
    let store = new_in_memory_store();
    store
        .rebuild(&snapshot(vec![
            sheet("Sheet1", &[("A1", Some("100"), None), ("A2", Some("1"), None)]),
            sheet("Sheet2", &[("A1", Some("5"), None), ("A2", Some("7"), None)]),
        ]))
        .await
        .unwrap();

    let summary = store
        .upsert_cell(CellUpdate {
            address: addr("A1"),
            value: None,
            formula_text: Some("=A2*3".to_string()),
            sheet_name: "Sheet2".to_string(),
        })
        .await
        .unwrap();

    assert!(!summary.created);
    assert_eq!(summary.edges_added, 1);
    let untouched = store.get_cell(&addr("Sheet1!A1")).await.unwrap().unwrap();
    assert_eq!(untouched.raw_value.as_deref(), Some("100"));
    let dependents = store
        .traverse_dependents(&addr("Sheet2!A2"), 5, None)
        .await
        .unwrap();
    assert_eq!(addrs(&dependents), vec!["SHEET2!A1"]);
}

#[tokio::test]
async fn test_repeated_address_keeps_only_last_formula_edges() {
    let store = new_in_memory_store();
    let summary = store
        .rebuild(&snapshot(vec![sheet(
            "Sheet1",
            &[
                ("A1", Some("1"), None),
                ("B1", Some("2"), None),
                ("C1", None, Some("=A1")),
                ("C1", None, Some("=B1")),
            ],
        )]))
        .await
        .unwrap();
    assert_eq!((summary.cells, summary.edges), (3, 1));

    let export = store.export().await.unwrap();
    assert_eq!(export.edges.len(), 1);
    assert_eq!(export.edges[0].to, addr("B1"));
    assert_eq!(export.edges[0].formula_text, "=B1");
    assert!(
        store
            .traverse_dependents(&addr("A1"), 5, None)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_repeated_reference_creates_repeated_edges() {
    let store = new_in_memory_store();
    let summary = store
        .rebuild(&snapshot(vec![sheet(
            "Sheet1",
            &[("A1", Some("3"), None), ("A2", None, Some("=A1+A1"))],
        )]))
        .await
        .unwrap();
    assert_eq!(summary.edges, 2);

    let export = store.export().await.unwrap();
    assert!(
        export
            .edges
            .iter()
            .all(|e| e.from == addr("A2") && e.to == addr("A1"))
    );
    assert_ne!(export.edges[0].id, export.edges[1].id);

    // Traversal still reports A2 once.
    let dependents = store.traverse_dependents(&addr("A1"), 5, None).await.unwrap();
    assert_eq!(addrs(&dependents), vec!["A2"]);
}

#[tokio::test]
async fn test_upserting_same_formula_accumulates_outgoing_edges() {
    let store = new_in_memory_store();
    store.rebuild(&budget()).await.unwrap();
    let update = CellUpdate {
        address: addr("A3"),
        value: Some("300".to_string()),
        formula_text: Some("=A1+A2".to_string()),
        sheet_name: "Sheet1".to_string(),
    };

    let first = store.upsert_cell(update.clone()).await.unwrap();
    assert_eq!((first.edges_removed, first.edges_added), (1, 2));
    let second = store.upsert_cell(update).await.unwrap();
    assert_eq!((second.edges_removed, second.edges_added), (0, 2));

    // Only edges into A3 are deleted, so A3's outgoing edges pile up.
    let export = store.export().await.unwrap();
    let a3_to_a1 = export
        .edges
        .iter()
        .filter(|e| e.from == addr("A3") && e.to == addr("A1"))
        .count();
    assert_eq!(a3_to_a1, 3);
    assert_eq!(export.edges.len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_readers_see_upsert_before_or_after_never_between() {
    for _ in 0..50 {
        let store = new_in_memory_store();
        store.rebuild(&budget()).await.unwrap();

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .upsert_cell(CellUpdate {
                        address: addr("A3"),
                        value: Some("0".to_string()),
                        formula_text: Some("=C1".to_string()),
                        sheet_name: "Sheet1".to_string(),
                    })
                    .await
            })
        };
        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.export().await })
        };
        let (written, read) = tokio::join!(writer, reader);
        written.unwrap().unwrap();
        let export = read.unwrap().unwrap();

        let a3 = export
            .cells
            .iter()
            .find(|c| c.address == addr("A3"))
            .unwrap();
        let new_edge = export
            .edges
            .iter()
            .any(|e| e.from == addr("A3") && e.to == addr("C1"));
        let edge_into_a3 = export.edges.iter().any(|e| e.to == addr("A3"));
        match a3.formula_text.as_deref() {
            Some("=A1+A2") => assert!(!new_edge && edge_into_a3),
            Some("=C1") => assert!(new_edge && !edge_into_a3),
            other => panic!("unexpected A3 formula {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_paths_pattern_lists_every_prefix() {
    let store = new_in_memory_store();
    store.rebuild(&budget()).await.unwrap();

    let PatternMatch::Paths { target, paths } = store
        .query(
            &GraphPattern::PathsInto {
                address: addr("A1"),
                max_depth: 5,
            },
            None,
        )
        .await
        .unwrap()
    else {
        panic!("expected paths");
    };
    assert_eq!(target.unwrap().address, addr("A1"));
    let lengths: Vec<usize> = paths.iter().map(|p| p.len()).collect();
    assert_eq!(lengths, vec![1, 2]);
}

#[tokio::test]
async fn test_cells_pattern_filters_by_address() {
    let store = new_in_memory_store();
    store.rebuild(&budget()).await.unwrap();

    let PatternMatch::Cells(cells) = store
        .query(
            &GraphPattern::Cells {
                filter: CellFilter::address(addr("B1")),
                limit: None,
            },
            None,
        )
        .await
        .unwrap()
    else {
        panic!("expected cells");
    };
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0].formula_text.as_deref(), Some("=A3*2"));
}
