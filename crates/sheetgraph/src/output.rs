//! Output formatting for CLI commands.
//!
//! Every command renders either human-readable text or the JSON form of its
//! [`ApiResponse`].

use crate::app::{AnalysisReport, ApiResponse};
use crate::domain::CellAddress;
use crate::propagator::PropagationOutcome;
use crate::query::{Entity, GraphSample, ImpactAnalysisResult, QueryAnswer, QueryResult};
use crate::storage::StoreStats;
use colored::Colorize;
use serde::Serialize;
use std::io::{self, Write};

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(handle, "{json}")
}

/// Render a response, then turn a failure into an error for the exit status.
///
/// In JSON mode the whole response is printed, failures included. In text
/// mode only a successful payload is rendered; the failure message becomes
/// the returned error.
pub fn emit<T, F>(response: &ApiResponse<T>, mode: OutputMode, render: F) -> anyhow::Result<()>
where
    T: Serialize,
    F: FnOnce(&mut io::StdoutLock<'_>, &T) -> io::Result<()>,
{
    if mode == OutputMode::Json {
        print_json(response)?;
    }
    match response {
        ApiResponse::Success { data } => {
            if mode == OutputMode::Text {
                render(&mut io::stdout().lock(), data)?;
            }
            Ok(())
        }
        ApiResponse::Failure { message, .. } => anyhow::bail!("{message}"),
    }
}

// ============================================================================
// Text Formatting
// ============================================================================

fn entity_line<W: Write>(w: &mut W, entity: &Entity) -> io::Result<()> {
    write!(w, "  {}", entity.id.cyan())?;
    if let Some(value) = &entity.value {
        write!(w, "  {value}")?;
    }
    if let Some(formula) = &entity.formula {
        write!(w, "  {}", formula.dimmed())?;
    }
    if let Some(label) = &entity.semantic_label {
        write!(w, "  [{}]", label.magenta())?;
    }
    writeln!(w)
}

/// Render a path as `target <- dependent <- ...`.
fn path_line(path: &QueryResult) -> String {
    path.entities
        .iter()
        .map(|e| e.id.cyan().to_string())
        .collect::<Vec<_>>()
        .join(" <- ")
}

/// Write the analysis header and graph counts
pub fn write_analysis<W: Write>(w: &mut W, report: &AnalysisReport) -> io::Result<()> {
    writeln!(
        w,
        "{} {}",
        "✓".green(),
        format!("{} '{}'", report.message, report.spreadsheet_id).bold()
    )?;
    let s = &report.summary;
    writeln!(w, "  Sheets: {}", s.sheets)?;
    writeln!(w, "  Cells:  {}", s.cells)?;
    writeln!(w, "  Edges:  {}", s.edges)?;
    if s.dangling_references > 0 {
        writeln!(
            w,
            "  {}",
            format!("{} references to missing cells skipped", s.dangling_references).yellow()
        )?;
    }
    Ok(())
}

/// Write node and edge counts
pub fn write_stats<W: Write>(w: &mut W, stats: &StoreStats) -> io::Result<()> {
    writeln!(w, "{}", "Dependency Graph".bold())?;
    writeln!(w, "================")?;
    writeln!(w, "Sheets: {}", stats.sheets)?;
    writeln!(w, "Cells:  {}", stats.cells)?;
    writeln!(w, "Edges:  {}", stats.edges)
}

/// Write matched cells followed by the explanation
pub fn write_query_result<W: Write>(w: &mut W, result: &QueryResult) -> io::Result<()> {
    writeln!(w, "{}", result.explanation.bold())?;
    if result.entities.is_empty() {
        return writeln!(w, "  {}", "(no matching cells)".dimmed());
    }
    for entity in &result.entities {
        entity_line(w, entity)?;
    }
    Ok(())
}

/// Write impact paths, target first, and the affected cells
pub fn write_impact<W: Write>(w: &mut W, impact: &ImpactAnalysisResult) -> io::Result<()> {
    match &impact.source {
        Some(source) => writeln!(w, "Impact of {}", source.id.cyan().bold())?,
        None => writeln!(w, "{}", "Cell not found".yellow())?,
    }
    writeln!(w, "{}", impact.explanation)?;
    for path in &impact.paths {
        writeln!(w, "  {}", path_line(path))?;
    }
    let affected = impact.affected_cells();
    if !affected.is_empty() {
        writeln!(w, "Affected: {}", affected.join(", ").cyan())?;
    }
    Ok(())
}

/// Write either kind of query answer
pub fn write_answer<W: Write>(w: &mut W, answer: &QueryAnswer) -> io::Result<()> {
    match answer {
        QueryAnswer::Entities(result) => write_query_result(w, result),
        QueryAnswer::Impact(impact) => write_impact(w, impact),
    }
}

/// Write the dependents of `cell`, one per line
pub fn write_dependents<W: Write>(
    w: &mut W,
    cell: &str,
    dependents: &[CellAddress],
) -> io::Result<()> {
    if dependents.is_empty() {
        return writeln!(w, "Nothing depends on {}", cell.cyan());
    }
    writeln!(w, "{} cells depend on {}:", dependents.len(), cell.cyan())?;
    for address in dependents {
        writeln!(w, "  {}", address.as_str().cyan())?;
    }
    Ok(())
}

/// Write one line per sampled edge
pub fn write_sample<W: Write>(w: &mut W, sample: &GraphSample) -> io::Result<()> {
    writeln!(w, "{}", sample.explanation.bold())?;
    for segment in &sample.paths {
        let [from, to] = segment.entities.as_slice() else {
            continue;
        };
        let formula = segment
            .relationships
            .first()
            .and_then(|r| r.formula.as_deref())
            .unwrap_or_default();
        writeln!(
            w,
            "  {} -> {}  {}",
            from.id.cyan(),
            to.id.cyan(),
            formula.dimmed()
        )?;
    }
    Ok(())
}

/// Write the result of a propagated change
pub fn write_outcome<W: Write>(w: &mut W, outcome: &PropagationOutcome) -> io::Result<()> {
    let impact = &outcome.impact;
    writeln!(
        w,
        "{} Updated {}",
        "✓".green(),
        impact.changed_cell.as_str().cyan().bold()
    )?;
    writeln!(
        w,
        "  Edges: -{} +{}",
        outcome.update.edges_removed, outcome.update.edges_added
    )?;
    if impact.affected_cells.is_empty() {
        writeln!(w, "  {}", "No other cells affected".dimmed())?;
    } else {
        let affected: Vec<&str> = impact.affected_cells.iter().map(|a| a.as_str()).collect();
        writeln!(w, "  Affected: {}", affected.join(", ").cyan())?;
    }
    if !outcome.delivered {
        writeln!(w, "  {}", "Notification was not delivered".yellow())?;
    }
    Ok(())
}
