//! Translation of parsed queries into store patterns.

use super::{Intent, ParsedQuery, QueryFilter};
use crate::domain::CellAddress;
use crate::error::{Error, Result};
use crate::storage::{CellField, CellFilter, CellPredicate, ComparisonOp, FilterValue, GraphPattern};
use serde::Serialize;
use serde_json::{Map, Value};

/// Default depth bound for dependency and impact queries.
pub const DEFAULT_QUERY_DEPTH: usize = 5;

/// Default cap on source cells in a global dependency listing.
pub const DEFAULT_SOURCE_LIMIT: usize = 10;

/// Parameter naming the cell a dependency or impact query is about.
pub const CELL_ID_PARAMETER: &str = "cellId";

/// Parameter adding a numeric equality check on the cell value.
pub const VALUE_PARAMETER: &str = "value";

/// Bounds applied during translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslateOptions {
    /// Depth bound for dependency and impact traversals
    pub query_depth: usize,
    /// Cap on source cells in a global dependency listing
    pub source_limit: usize,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            query_depth: DEFAULT_QUERY_DEPTH,
            source_limit: DEFAULT_SOURCE_LIMIT,
        }
    }
}

/// An executable, fully parameterized query.
///
/// User input only ever appears as bound operands inside `pattern` and as
/// entries of `parameters`; it is never spliced into query text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    /// The intent this plan answers
    pub intent: Intent,
    /// The store pattern to run
    pub pattern: GraphPattern,
    /// The bound parameters, for diagnostics and result metadata
    pub parameters: Map<String, Value>,
    /// Readable rendering of the plan's conditions
    pub description: String,
}

/// Translate a parsed query into an executable plan.
///
/// # Errors
///
/// - `Error::UnsupportedQuery` for intents without a translation
/// - `Error::InvalidQuery` for unknown operators or fields, non-numeric
///   value operands, or an impact query without `cellId`
pub fn translate(parsed: &ParsedQuery, options: &TranslateOptions) -> Result<QueryPlan> {
    let plan = match parsed.intent {
        Intent::FindEntities => find_entities(parsed)?,
        Intent::AnalyzeDependencies => analyze_dependencies(parsed, options)?,
        Intent::ImpactAnalysis => impact_analysis(parsed, options)?,
        Intent::GeneralQuery => {
            return Err(Error::UnsupportedQuery(parsed.intent.to_string()));
        }
    };
    tracing::debug!(
        intent = %plan.intent,
        pattern = plan.pattern.name(),
        conditions = %plan.description,
        "Translated query"
    );
    Ok(plan)
}

fn find_entities(parsed: &ParsedQuery) -> Result<QueryPlan> {
    let mut filter = CellFilter::all();
    let mut parameters = Map::new();
    let mut conditions = Vec::new();

    for query_filter in parsed.filters.values() {
        let op = ComparisonOp::parse(&query_filter.operator).ok_or_else(|| {
            Error::InvalidQuery(format!(
                "unsupported operator '{}' for field '{}'",
                query_filter.operator, query_filter.field
            ))
        })?;
        let field = CellField::parse(&query_filter.field).ok_or_else(|| {
            Error::InvalidQuery(format!("unknown cell field '{}'", query_filter.field))
        })?;

        let predicate = if field == CellField::Value {
            CellPredicate::NumericValue {
                op,
                operand: numeric_operand(query_filter)?,
            }
        } else {
            CellPredicate::Attribute {
                field,
                op,
                operand: filter_value(&query_filter.value),
            }
        };
        conditions.push(format!(
            "{} {op} {}",
            query_filter.field,
            render(&query_filter.value)
        ));
        parameters.insert(query_filter.field.clone(), query_filter.value.clone());
        filter = filter.and(predicate);
    }

    if let Some(value) = parsed.parameters.get(VALUE_PARAMETER) {
        let operand = as_number(value).ok_or_else(|| {
            Error::InvalidQuery(format!("parameter 'value' must be numeric, got {value}"))
        })?;
        conditions.push(format!("value = {}", render(value)));
        parameters.insert(VALUE_PARAMETER.to_string(), value.clone());
        filter = filter.and(CellPredicate::NumericValue {
            op: ComparisonOp::Eq,
            operand,
        });
    }

    let description = if conditions.is_empty() {
        "all cells".to_string()
    } else {
        conditions.join(" AND ")
    };

    Ok(QueryPlan {
        intent: Intent::FindEntities,
        pattern: GraphPattern::Cells {
            filter,
            limit: None,
        },
        parameters,
        description,
    })
}

fn analyze_dependencies(parsed: &ParsedQuery, options: &TranslateOptions) -> Result<QueryPlan> {
    let mut parameters = Map::new();

    let (sources, source_limit, description) = if let Some(cell) = parsed.cell_id()? {
        parameters.insert(CELL_ID_PARAMETER.to_string(), Value::from(cell.as_str()));
        let description = format!("dependents of {cell}");
        (CellFilter::address(cell), None, description)
    } else if !parsed.concepts.is_empty() {
        let concepts: Vec<String> = parsed.concepts.iter().map(|c| c.to_lowercase()).collect();
        parameters.insert("concepts".to_string(), Value::from(concepts.clone()));
        let description = format!("dependents of cells labeled {}", concepts.join(", "));
        (
            CellFilter::all().and(CellPredicate::LabelIn(concepts)),
            None,
            description,
        )
    } else {
        let description = format!("dependents of up to {} cells", options.source_limit);
        (CellFilter::all(), Some(options.source_limit), description)
    };

    Ok(QueryPlan {
        intent: Intent::AnalyzeDependencies,
        pattern: GraphPattern::Dependents {
            sources,
            max_depth: options.query_depth,
            source_limit,
        },
        parameters,
        description,
    })
}

fn impact_analysis(parsed: &ParsedQuery, options: &TranslateOptions) -> Result<QueryPlan> {
    let cell: CellAddress = parsed.cell_id()?.ok_or_else(|| {
        Error::InvalidQuery("impact analysis requires the 'cellId' parameter".to_string())
    })?;

    let mut parameters = Map::new();
    parameters.insert(CELL_ID_PARAMETER.to_string(), Value::from(cell.as_str()));
    let description = format!("paths into {cell}");

    Ok(QueryPlan {
        intent: Intent::ImpactAnalysis,
        pattern: GraphPattern::PathsInto {
            address: cell,
            max_depth: options.query_depth,
        },
        parameters,
        description,
    })
}

fn numeric_operand(filter: &QueryFilter) -> Result<f64> {
    as_number(&filter.value).ok_or_else(|| {
        Error::InvalidQuery(format!(
            "filter on '{}' needs a numeric operand, got {}",
            filter.field, filter.value
        ))
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn filter_value(value: &Value) -> FilterValue {
    match value {
        Value::Number(n) => n.as_f64().map_or_else(|| FilterValue::Text(n.to_string()), FilterValue::Number),
        Value::String(s) => FilterValue::Text(s.clone()),
        other => FilterValue::Text(other.to_string()),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryFilter;
    use rstest::rstest;
    use serde_json::json;

    fn find(filters: &[(&str, &str, Value)]) -> ParsedQuery {
        let mut parsed = ParsedQuery::new(Intent::FindEntities);
        for (field, operator, value) in filters {
            parsed = parsed.with_filter(QueryFilter {
                field: (*field).to_string(),
                operator: (*operator).to_string(),
                value: value.clone(),
            });
        }
        parsed
    }

    #[test]
    fn test_value_filter_becomes_numeric_predicate() {
        let plan = translate(&find(&[("value", ">", json!(100))]), &TranslateOptions::default())
            .unwrap();
        assert_eq!(
            plan.pattern,
            GraphPattern::Cells {
                filter: CellFilter::all().and(CellPredicate::NumericValue {
                    op: ComparisonOp::Gt,
                    operand: 100.0
                }),
                limit: None,
            }
        );
        assert_eq!(plan.description, "value > 100");
    }

    #[test]
    fn test_value_parameter_adds_equality() {
        let parsed = ParsedQuery::new(Intent::FindEntities).with_parameter("value", json!("42"));
        let plan = translate(&parsed, &TranslateOptions::default()).unwrap();
        let GraphPattern::Cells { filter, .. } = plan.pattern else {
            panic!("expected cells pattern");
        };
        assert_eq!(
            filter.predicates,
            vec![CellPredicate::NumericValue {
                op: ComparisonOp::Eq,
                operand: 42.0
            }]
        );
    }

    #[test]
    fn test_no_filters_matches_all_cells() {
        let plan = translate(&find(&[]), &TranslateOptions::default()).unwrap();
        assert_eq!(plan.description, "all cells");
    }

    #[rstest]
    #[case::bad_operator(("value", "=~", json!(1)))]
    #[case::unknown_field(("revenue", ">", json!(1)))]
    #[case::non_numeric_value(("value", ">", json!("abc")))]
    fn test_invalid_filters(#[case] filter: (&str, &str, Value)) {
        let err = translate(&find(&[filter]), &TranslateOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidQuery(_)));
    }

    #[test]
    fn test_dependency_plan_variants() {
        let options = TranslateOptions::default();

        let by_cell = ParsedQuery::new(Intent::AnalyzeDependencies).with_parameter("cellId", json!("a1"));
        let GraphPattern::Dependents { sources, source_limit, max_depth } =
            translate(&by_cell, &options).unwrap().pattern
        else {
            panic!("expected dependents pattern");
        };
        assert_eq!(sources, CellFilter::address(CellAddress::parse("A1")));
        assert_eq!(source_limit, None);
        assert_eq!(max_depth, 5);

        let mut by_concept = ParsedQuery::new(Intent::AnalyzeDependencies);
        by_concept.concepts = vec!["Revenue".to_string()];
        let GraphPattern::Dependents { sources, .. } = translate(&by_concept, &options).unwrap().pattern
        else {
            panic!("expected dependents pattern");
        };
        assert_eq!(
            sources.predicates,
            vec![CellPredicate::LabelIn(vec!["revenue".to_string()])]
        );

        let global = ParsedQuery::new(Intent::AnalyzeDependencies);
        let GraphPattern::Dependents { source_limit, .. } = translate(&global, &options).unwrap().pattern
        else {
            panic!("expected dependents pattern");
        };
        assert_eq!(source_limit, Some(10));
    }

    #[test]
    fn test_impact_requires_cell_id() {
        let parsed = ParsedQuery::new(Intent::ImpactAnalysis);
        assert!(matches!(
            translate(&parsed, &TranslateOptions::default()),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_impact_plan_is_parameterized() {
        let parsed = ParsedQuery::new(Intent::ImpactAnalysis).with_parameter("cellId", json!("A1'); DROP"));
        let plan = translate(&parsed, &TranslateOptions::default()).unwrap();
        assert!(matches!(plan.pattern, GraphPattern::PathsInto { max_depth: 5, .. }));
        assert!(plan.parameters.contains_key("cellId"));
    }

    #[test]
    fn test_general_query_is_unsupported() {
        let err = translate(&ParsedQuery::new(Intent::GeneralQuery), &TranslateOptions::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "Query intent not supported: GENERAL_QUERY");
    }
}
