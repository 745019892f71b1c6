//! Spreadsheet snapshot sources.
//!
//! A [`SpreadsheetSource`] produces the [`SpreadsheetSnapshot`] consumed by a
//! bulk rebuild. [`JsonSnapshotSource`] reads `<dir>/<spreadsheet-id>.json`
//! files with this shape:
//!
//! ```json
//! {
//!   "sheets": [
//!     {
//!       "sheetId": "s1",
//!       "sheetName": "Sheet1",
//!       "cells": [
//!         {"address": "A1", "value": "100"},
//!         {"address": "A3", "formula": "=A1+A2"}
//!       ]
//!     }
//!   ]
//! }
//! ```

use crate::domain::SpreadsheetSnapshot;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Produces spreadsheet snapshots by id.
#[async_trait]
pub trait SpreadsheetSource: Send + Sync {
    /// Read the full contents of a spreadsheet.
    async fn read(&self, spreadsheet_id: &str) -> Result<SpreadsheetSnapshot>;
}

/// Reads snapshots from JSON files in a directory.
#[derive(Debug, Clone)]
pub struct JsonSnapshotSource {
    dir: PathBuf,
}

impl JsonSnapshotSource {
    /// Create a source reading from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory snapshots are read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read a snapshot from an explicit file path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Json` if it
    /// is not a valid snapshot.
    pub async fn read_file(path: &Path) -> Result<SpreadsheetSnapshot> {
        let content = fs::read_to_string(path).await?;
        let snapshot: SpreadsheetSnapshot = serde_json::from_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            sheets = snapshot.sheets.len(),
            cells = snapshot.cell_count(),
            "Read snapshot"
        );
        Ok(snapshot)
    }
}

/// Ids name a file inside the source directory, so no separators or dot segments.
fn validate_id(spreadsheet_id: &str) -> Result<()> {
    let valid = !spreadsheet_id.is_empty()
        && spreadsheet_id != "."
        && spreadsheet_id != ".."
        && !spreadsheet_id.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(Error::Source(format!(
            "invalid spreadsheet id '{spreadsheet_id}'"
        )))
    }
}

#[async_trait]
impl SpreadsheetSource for JsonSnapshotSource {
    async fn read(&self, spreadsheet_id: &str) -> Result<SpreadsheetSnapshot> {
        validate_id(spreadsheet_id)?;
        let path = self.dir.join(format!("{spreadsheet_id}.json"));
        match Self::read_file(&path).await {
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => Err(Error::Source(
                format!("spreadsheet '{spreadsheet_id}' not found in {}", self.dir.display()),
            )),
            other => other,
        }
    }
}
