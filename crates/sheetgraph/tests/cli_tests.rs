//! Integration tests for the sheetgraph CLI.
//!
//! These tests run the built binary against snapshot files in a temporary
//! directory.

use rstest::{fixture, rstest};
use serde_json::Value;
use tempfile::TempDir;

mod common;
use common::{budget, run_sheetgraph_in_dir, write_snapshot};

// ============================================================================
// Test Fixtures
// ============================================================================

/// A temporary directory with `budget.json` and `snapshots/budget.json`
#[fixture]
fn workspace() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp directory");
    write_snapshot(temp.path(), "budget", &budget());
    let snapshots = temp.path().join("snapshots");
    std::fs::create_dir(&snapshots).expect("Failed to create snapshot dir");
    write_snapshot(&snapshots, "budget", &budget());
    temp
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[rstest]
fn test_cli_help(workspace: TempDir) {
    let output = run_sheetgraph_in_dir(workspace.path(), &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sheetgraph"));
    assert!(stdout.contains("Usage:"));
}

#[rstest]
fn test_cli_version(workspace: TempDir) {
    let output = run_sheetgraph_in_dir(workspace.path(), &["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

// ============================================================================
// Command Tests
// ============================================================================

#[rstest]
fn test_analyze_reads_snapshot_dir(workspace: TempDir) {
    let output = run_sheetgraph_in_dir(workspace.path(), &["--json", "analyze", "budget"]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json = stdout_json(&output);
    assert_eq!(json["status"], "SUCCESS");
    assert_eq!(json["data"]["summary"]["cells"], 5);
    assert_eq!(json["data"]["summary"]["edges"], 3);
}

#[rstest]
fn test_analyze_text_output(workspace: TempDir) {
    let output = run_sheetgraph_in_dir(workspace.path(), &["analyze", "budget"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Knowledge graph built successfully 'budget'"));
    assert!(stdout.contains("Edges:  3"));
}

#[rstest]
fn test_impact_with_snapshot_file(workspace: TempDir) {
    let output = run_sheetgraph_in_dir(
        workspace.path(),
        &["--snapshot", "budget.json", "impact", "A1"],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("A1 <- A3 <- B1"));
    assert!(stdout.contains("Affected: A3, B1"));
}

#[rstest]
fn test_query_json(workspace: TempDir) {
    let output = run_sheetgraph_in_dir(
        workspace.path(),
        &[
            "--json",
            "--spreadsheet",
            "budget",
            "query",
            "show cells where value > 250",
        ],
    );
    assert!(output.status.success());
    let json = stdout_json(&output);
    let ids: Vec<&str> = json["data"]["entities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["A3", "B1"]);
}

#[rstest]
fn test_unsupported_query_fails(workspace: TempDir) {
    let output = run_sheetgraph_in_dir(
        workspace.path(),
        &["--json", "--snapshot", "budget.json", "query", "hello"],
    );
    assert!(!output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["status"], "FAILURE");
    assert_eq!(json["kind"], "client");
}

#[rstest]
fn test_dependents_depth(workspace: TempDir) {
    let output = run_sheetgraph_in_dir(
        workspace.path(),
        &["--json", "--snapshot", "budget.json", "dependents", "A1", "--depth", "1"],
    );
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["data"], serde_json::json!(["A3"]));
}

#[rstest]
fn test_visualize_edges(workspace: TempDir) {
    let output = run_sheetgraph_in_dir(
        workspace.path(),
        &["--json", "--snapshot", "budget.json", "visualize"],
    );
    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output)["data"]["paths"].as_array().unwrap().len(),
        3
    );
}

#[rstest]
fn test_change_reports_impact(workspace: TempDir) {
    let output = run_sheetgraph_in_dir(
        workspace.path(),
        &[
            "--json",
            "--snapshot",
            "budget.json",
            "change",
            "A2",
            "250",
            "--old-value",
            "200",
        ],
    );
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["data"]["impact"]["changedCell"], "A2");
    assert_eq!(
        json["data"]["impact"]["affectedCells"],
        serde_json::json!(["A3", "B1"])
    );
}

#[rstest]
fn test_change_without_value_or_formula_fails(workspace: TempDir) {
    let output = run_sheetgraph_in_dir(
        workspace.path(),
        &["--snapshot", "budget.json", "change", "A2"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Nothing to change"));
}

#[rstest]
fn test_export_is_json(workspace: TempDir) {
    let output = run_sheetgraph_in_dir(workspace.path(), &["--snapshot", "budget.json", "export"]);
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["cells"].as_array().unwrap().len(), 5);
    assert_eq!(json["edges"].as_array().unwrap().len(), 3);
}

#[rstest]
fn test_command_without_graph_fails(workspace: TempDir) {
    let output = run_sheetgraph_in_dir(workspace.path(), &["stats"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No graph loaded"));
}

#[rstest]
fn test_config_file_is_applied(workspace: TempDir) {
    std::fs::write(
        workspace.path().join("sheetgraph.yaml"),
        "visualize-edge-limit: 1\n",
    )
    .unwrap();
    let output = run_sheetgraph_in_dir(
        workspace.path(),
        &["--json", "--snapshot", "budget.json", "visualize"],
    );
    assert!(output.status.success());
    assert_eq!(
        stdout_json(&output)["data"]["paths"].as_array().unwrap().len(),
        1
    );
}

#[rstest]
fn test_invalid_config_fails(workspace: TempDir) {
    std::fs::write(workspace.path().join("sheetgraph.yaml"), "query-depth: 0\n").unwrap();
    let output = run_sheetgraph_in_dir(workspace.path(), &["--snapshot", "budget.json", "stats"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("query-depth"));
}
