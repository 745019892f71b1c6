//! Semantic labeling of cell content.
//!
//! Labels are assigned by a fixed rule list, first match wins:
//!
//! 1. First-row cells are [`SemanticLabel::Header`]
//! 2. Codes like `ORD-12345`, or values mentioning "id", are [`SemanticLabel::Id`]
//! 3. Short letters-and-spaces text is a [`SemanticLabel::Label`]
//!
//! Blank values never get a label.

use crate::domain::{CellAddress, SemanticLabel};
use regex::Regex;
use std::sync::LazyLock;

static HEADER_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]+1$").expect("header pattern is a valid regex"));

static CODE_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z]{2,5}-\d{2,6}$").expect("code pattern is a valid regex")
});

static WORDS_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\s]+$").expect("words pattern is a valid regex"));

/// Longest value still considered a free-text label.
const MAX_LABEL_LENGTH: usize = 20;

/// Context about the sheet a cell lives in.
///
/// The current rules only look at the address and value; the sheet name is
/// carried so rules can be scoped per sheet without changing call sites.
#[derive(Debug, Clone, Copy)]
pub struct SheetContext<'a> {
    /// Name of the owning sheet
    pub sheet_name: &'a str,
}

/// Infer the semantic label of a cell.
///
/// The header rule applies to the cell part of the address, so `SHEET1!B1`
/// is a header just like `B1`.
pub fn infer_label(
    address: &CellAddress,
    value: Option<&str>,
    _sheet: SheetContext<'_>,
) -> Option<SemanticLabel> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }

    if HEADER_ADDRESS.is_match(address.cell_part()) {
        return Some(SemanticLabel::Header);
    }

    if CODE_VALUE.is_match(value) || value.to_lowercase().contains("id") {
        return Some(SemanticLabel::Id);
    }

    if value.chars().count() <= MAX_LABEL_LENGTH && WORDS_VALUE.is_match(value) {
        return Some(SemanticLabel::Label);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SHEET: SheetContext<'static> = SheetContext {
        sheet_name: "Sheet1",
    };

    fn label(address: &str, value: Option<&str>) -> Option<SemanticLabel> {
        infer_label(&CellAddress::parse(address), value, SHEET)
    }

    #[rstest]
    #[case::first_row_number("B1", "12345", Some(SemanticLabel::Header))]
    #[case::first_row_text("AA1", "Revenue", Some(SemanticLabel::Header))]
    #[case::qualified_first_row("Sheet1!C1", "x", Some(SemanticLabel::Header))]
    #[case::code("A5", "ORD-12345", Some(SemanticLabel::Id))]
    #[case::mentions_id("A5", "Customer Id", Some(SemanticLabel::Id))]
    #[case::words("A5", "Revenue", Some(SemanticLabel::Label))]
    #[case::words_with_spaces("A5", "Net Revenue", Some(SemanticLabel::Label))]
    #[case::too_long("A5", "Quarterly Revenue Forecast", None)]
    #[case::digits("A5", "12345", None)]
    #[case::row_eleven_is_not_header("A11", "12345", None)]
    fn test_infer_label(
        #[case] address: &str,
        #[case] value: &str,
        #[case] expected: Option<SemanticLabel>,
    ) {
        assert_eq!(label(address, Some(value)), expected);
    }

    #[rstest]
    #[case::absent(None)]
    #[case::empty(Some(""))]
    #[case::whitespace(Some("   "))]
    fn test_blank_values_have_no_label(#[case] value: Option<&str>) {
        assert_eq!(label("A1", value), None);
    }

    #[test]
    fn test_value_is_trimmed_before_matching() {
        assert_eq!(label("A5", Some("  INV-001  ")), Some(SemanticLabel::Id));
    }
}
