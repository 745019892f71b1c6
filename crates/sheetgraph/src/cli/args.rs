//! CLI argument structs for all commands.

use clap::Parser;

use crate::query::DEFAULT_QUERY_DEPTH;

/// Reject blank cell references at parse time.
pub fn validate_cell(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("cell reference cannot be empty".to_string());
    }
    if trimmed.chars().any(char::is_whitespace) && !trimmed.contains('!') {
        return Err(format!("'{trimmed}' is not a cell reference"));
    }
    Ok(trimmed.to_string())
}

/// Arguments for the `analyze` command
#[derive(Parser, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Spreadsheet id, read from `<snapshot-dir>/<id>.json`
    pub spreadsheet_id: String,
}

/// Arguments for the `query` command
#[derive(Parser, Debug, Clone)]
pub struct QueryArgs {
    /// The question, e.g. "show cells where value > 100"
    pub text: String,

    /// Cell the question is about (sets the `cellId` parameter)
    #[arg(long, value_parser = validate_cell)]
    pub cell: Option<String>,

    /// Exact numeric value to match (sets the `value` parameter)
    #[arg(long)]
    pub value: Option<f64>,
}

/// Arguments for the `impact` command
#[derive(Parser, Debug, Clone)]
pub struct ImpactArgs {
    /// Cell whose dependents to trace
    #[arg(value_parser = validate_cell)]
    pub cell: String,
}

/// Arguments for the `dependents` command
#[derive(Parser, Debug, Clone)]
pub struct DependentsArgs {
    /// Cell whose dependents to list
    #[arg(value_parser = validate_cell)]
    pub cell: String,

    /// Maximum traversal depth
    #[arg(short, long, default_value_t = DEFAULT_QUERY_DEPTH)]
    pub depth: usize,
}

/// Arguments for the `change` command
#[derive(Parser, Debug, Clone)]
pub struct ChangeArgs {
    /// Cell being written
    #[arg(value_parser = validate_cell)]
    pub cell: String,

    /// New raw value
    pub value: Option<String>,

    /// New formula text, e.g. "=A1*2"
    #[arg(long)]
    pub formula: Option<String>,

    /// Previous raw value, reported in the notification
    #[arg(long)]
    pub old_value: Option<String>,

    /// Sheet owning the cell
    #[arg(long, default_value = "")]
    pub sheet: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("A1", "A1")]
    #[case::padded("  B2 ", "B2")]
    #[case::qualified("'My Sheet'!C3", "'My Sheet'!C3")]
    fn test_validate_cell_accepts(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(validate_cell(raw).unwrap(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::sentence("A1 B2")]
    fn test_validate_cell_rejects(#[case] raw: &str) {
        assert!(validate_cell(raw).is_err());
    }
}
