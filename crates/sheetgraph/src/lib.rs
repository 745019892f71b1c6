//! Sheetgraph - a live dependency graph over spreadsheet formulas.
//!
//! Cells become graph nodes and formula references become `DEPENDS_ON`
//! edges. The graph is rebuilt in bulk from a spreadsheet snapshot, kept
//! current by single-cell change events, and answers impact, dependency and
//! filtered-listing queries classified from free text.

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod formula;
pub mod intent;
pub mod labeler;
pub mod notify;
pub mod propagator;
pub mod query;
pub mod source;
pub mod storage;

// Public CLI module (needed by binary)
pub mod cli;

pub mod output;

pub use error::{Error, Result};
