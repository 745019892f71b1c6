//! Formula reference extraction and classification.
//!
//! This module turns raw formula text into the normalized references used as
//! graph keys, and assigns each formula a coarse [`FormulaKind`]. It is a
//! heuristic scanner, not a formula parser: it never evaluates anything and
//! never fails the surrounding build.
//!
//! # Reference Normalization
//!
//! | Input            | Normalized    |
//! |------------------|---------------|
//! | `a1`             | `A1`          |
//! | `$B$7`           | `B7`          |
//! | `Sheet1!$A$1`    | `SHEET1!A1`   |
//! | `'Q1 Plan'!C3`   | `Q1PLAN!C3`   |
//!
//! # Example
//!
//! ```
//! use sheetgraph::formula::extract_dependencies;
//!
//! let refs = extract_dependencies(Some("=SUM(A1:A3)+Sheet2!$B$1"));
//! assert_eq!(refs, vec!["A1", "A3", "SHEET2!B1"]);
//! ```

use crate::domain::FormulaKind;
use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Cell tokens (optionally sheet-qualified and `$`-anchored), or whole-column ranges.
static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?:(?:'[^']+'|[A-Za-z0-9_.]+)!)?\$?[A-Z]+\$?[0-9]+",
        r"|(?:(?:'[^']+'|[A-Za-z0-9_.]+)!)?\$?[A-Z]+:\$?[A-Z]+\b",
    ))
    .expect("reference pattern is a valid regex")
});

/// Keywords checked for lookup formulas, after aggregation.
const LOOKUP_KEYWORDS: [&str; 3] = ["VLOOKUP", "HLOOKUP", "INDEX"];

/// Operators that mark a formula as arithmetic.
const ARITHMETIC_OPERATORS: [char; 4] = ['+', '-', '*', '/'];

/// Extract normalized references from a formula.
///
/// Strips a leading `=`, then returns every cell or range token in
/// first-seen order. Duplicates are kept. Absent, empty or malformed input
/// yields an empty list; malformed input is logged at debug level.
pub fn extract_dependencies(formula: Option<&str>) -> Vec<String> {
    match try_extract_dependencies(formula) {
        Ok(references) => references,
        Err(err) => {
            tracing::debug!(error = %err, "Treating malformed formula as having no dependencies");
            Vec::new()
        }
    }
}

/// Extract normalized references, reporting structurally malformed formulas.
///
/// # Errors
///
/// Returns [`Error::MalformedFormula`] when parentheses are unbalanced or a
/// string literal or quoted sheet name is left unterminated.
pub fn try_extract_dependencies(formula: Option<&str>) -> Result<Vec<String>> {
    let Some(formula) = formula.filter(|f| !f.is_empty()) else {
        return Ok(Vec::new());
    };

    check_structure(formula)?;

    let body = formula.strip_prefix('=').unwrap_or(formula);
    Ok(REFERENCE_PATTERN
        .find_iter(body)
        .map(|m| normalize_reference(m.as_str()))
        .filter(|r| !r.is_empty())
        .collect())
}

/// Normalize a single reference string.
///
/// Trims and uppercases. With a `Sheet!Ref` qualifier the sheet part keeps
/// only ASCII letters and digits and the cell part loses its `$` anchors;
/// without one only the `$` anchors are removed. Blank input normalizes to
/// an empty string.
pub fn normalize_reference(reference: &str) -> String {
    let reference = reference.trim().to_uppercase();
    if reference.is_empty() {
        return reference;
    }

    match reference.split_once('!') {
        Some((sheet, cell)) => {
            format!("{}!{}", normalize_sheet_name(sheet), cell.replace('$', ""))
        }
        None => reference.replace('$', ""),
    }
}

/// Normalize a sheet name into the qualifier used in addresses.
///
/// Keeps only ASCII letters and digits, uppercased: `'Q1 Plan'` becomes `Q1PLAN`.
pub fn normalize_sheet_name(sheet: &str) -> String {
    sheet
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Classify a formula by keyword.
///
/// Case-insensitive substring checks in fixed priority order: aggregation,
/// lookup, conditional, arithmetic, other. Absent or empty formulas are
/// [`FormulaKind::None`].
pub fn analyze_formula_kind(formula: Option<&str>) -> FormulaKind {
    let Some(formula) = formula.filter(|f| !f.is_empty()) else {
        return FormulaKind::None;
    };

    let upper = formula.to_uppercase();
    if upper.contains("SUM") {
        FormulaKind::Aggregation
    } else if LOOKUP_KEYWORDS.iter().any(|k| upper.contains(k)) {
        FormulaKind::Lookup
    } else if upper.contains("IF") {
        FormulaKind::Conditional
    } else if upper.contains(ARITHMETIC_OPERATORS) {
        FormulaKind::Arithmetic
    } else {
        FormulaKind::Other
    }
}

/// Reject formulas with unbalanced parentheses or unterminated strings.
fn check_structure(formula: &str) -> Result<()> {
    let malformed = |reason: &str| Error::MalformedFormula {
        formula: formula.to_string(),
        reason: reason.to_string(),
    };

    let mut depth: usize = 0;
    let mut in_string = false;
    let mut in_sheet_name = false;
    for c in formula.chars() {
        match c {
            '"' if !in_sheet_name => in_string = !in_string,
            '\'' if !in_string => in_sheet_name = !in_sheet_name,
            _ if in_string || in_sheet_name => {}
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| malformed("unexpected ')'"))?;
            }
            _ => {}
        }
    }

    if in_string {
        return Err(malformed("unterminated string literal"));
    }
    if in_sheet_name {
        return Err(malformed("unterminated sheet name"));
    }
    if depth > 0 {
        return Err(malformed("unclosed '('"));
    }
    Ok(())
}
