//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use sheetgraph::domain::{CellSnapshot, SheetSnapshot, SpreadsheetSnapshot};
use std::path::Path;
use std::process::{Command, Output};

/// One sheet of `(address, value, formula)` triples.
pub fn sheet(name: &str, cells: &[(&str, Option<&str>, Option<&str>)]) -> SheetSnapshot {
    SheetSnapshot {
        sheet_id: name.to_lowercase(),
        sheet_name: name.to_string(),
        cells: cells
            .iter()
            .map(|(address, value, formula)| CellSnapshot::new(address, *value, *formula))
            .collect(),
    }
}

/// A spreadsheet made of the given sheets.
pub fn snapshot(sheets: Vec<SheetSnapshot>) -> SpreadsheetSnapshot {
    SpreadsheetSnapshot { sheets }
}

/// A3 = A1 + A2, B1 = A3 * 2, C1 holds text.
pub fn budget() -> SpreadsheetSnapshot {
    snapshot(vec![sheet(
        "Sheet1",
        &[
            ("A1", Some("100"), None),
            ("A2", Some("200"), None),
            ("A3", Some("300"), Some("=A1+A2")),
            ("B1", Some("600"), Some("=A3*2")),
            ("C1", Some("abc"), None),
        ],
    )])
}

/// Write `snapshot` as `<dir>/<name>.json`.
pub fn write_snapshot(dir: &Path, name: &str, snapshot: &SpreadsheetSnapshot) {
    let json = serde_json::to_string_pretty(snapshot).expect("Failed to serialize snapshot");
    std::fs::write(dir.join(format!("{name}.json")), json).expect("Failed to write snapshot");
}

/// Run the sheetgraph binary in the specified directory
pub fn run_sheetgraph_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sheetgraph"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute sheetgraph")
}
