//! Command execution logic.

use anyhow::Result;
use serde_json::{Map, Value};

use super::args::{AnalyzeArgs, ChangeArgs, DependentsArgs, ImpactArgs, QueryArgs};
use crate::app::App;
use crate::domain::{CellAddress, CellChange};
use crate::output::{self, OutputMode};
use crate::query::{CELL_ID_PARAMETER, SemanticQuery, VALUE_PARAMETER};

/// Execute the analyze command
pub async fn execute_analyze(app: &App, args: &AnalyzeArgs, mode: OutputMode) -> Result<()> {
    let response = app.analyze(&args.spreadsheet_id).await;
    output::emit(&response, mode, |w, report| output::write_analysis(w, report))
}

/// Execute the stats command
pub async fn execute_stats(app: &App, mode: OutputMode) -> Result<()> {
    let response = app.stats().await;
    output::emit(&response, mode, |w, stats| output::write_stats(w, stats))
}

/// Execute the query command
pub async fn execute_query(app: &App, args: &QueryArgs, mode: OutputMode) -> Result<()> {
    let mut parameters = Map::new();
    if let Some(cell) = &args.cell {
        parameters.insert(CELL_ID_PARAMETER.to_string(), Value::from(cell.as_str()));
    }
    if let Some(value) = args.value {
        parameters.insert(VALUE_PARAMETER.to_string(), Value::from(value));
    }
    let response = app
        .query(SemanticQuery {
            query: args.text.clone(),
            parameters,
        })
        .await;
    output::emit(&response, mode, |w, answer| output::write_answer(w, answer))
}

/// Execute the impact command
pub async fn execute_impact(app: &App, args: &ImpactArgs, mode: OutputMode) -> Result<()> {
    let response = app.impact(&args.cell).await;
    output::emit(&response, mode, |w, impact| output::write_impact(w, impact))
}

/// Execute the dependents command
pub async fn execute_dependents(app: &App, args: &DependentsArgs, mode: OutputMode) -> Result<()> {
    let response = app.dependents(&args.cell, args.depth).await;
    output::emit(&response, mode, |w, dependents| {
        output::write_dependents(w, &args.cell, dependents)
    })
}

/// Execute the visualize command
pub async fn execute_visualize(app: &App, mode: OutputMode) -> Result<()> {
    let response = app.visualize().await;
    output::emit(&response, mode, |w, sample| output::write_sample(w, sample))
}

/// Execute the change command
pub async fn execute_change(app: &App, args: &ChangeArgs, mode: OutputMode) -> Result<()> {
    if args.value.is_none() && args.formula.is_none() {
        anyhow::bail!("Nothing to change: pass a value and/or --formula");
    }
    let change = CellChange {
        address: CellAddress::parse(&args.cell),
        old_value: args.old_value.clone(),
        new_value: args.value.clone(),
        formula_text: args.formula.clone(),
        sheet_name: args.sheet.clone(),
    };
    let response = app.apply_change(change).await;
    output::emit(&response, mode, |w, outcome| output::write_outcome(w, outcome))
}

/// Execute the export command
///
/// The export is JSON in both output modes.
pub async fn execute_export(app: &App) -> Result<()> {
    match app.export().await {
        crate::app::ApiResponse::Success { data } => {
            output::print_json(&data)?;
            Ok(())
        }
        crate::app::ApiResponse::Failure { message, .. } => anyhow::bail!("{message}"),
    }
}
