//! Intent classification of free-text questions.
//!
//! An [`IntentClassifier`] turns question text into a [`ClassifiedQuery`]:
//! the intent, the business concepts mentioned, and any `field op value`
//! filters. [`KeywordClassifier`] does this with keyword lists, a fixed
//! concept map, and a token scan; it is not language understanding.

use crate::query::{Intent, ParsedQuery, QueryFilter};
use crate::storage::ComparisonOp;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Words, numbers, comparison operators, or any other single character.
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z_][A-Za-z0-9_.]*|-?\d+(?:\.\d+)?|>=|<=|==|!=|[=<>]|\S")
        .expect("token pattern is a valid regex")
});

const FIND_KEYWORDS: [&str; 3] = ["show", "find", "list"];
const IMPACT_KEYWORDS: [&str; 3] = ["impact", "affect", "change"];
const DEPENDENCY_KEYWORDS: [&str; 3] = ["depend", "connect", "relate"];

/// Business concepts and the words that mention them, in reporting order.
const CONCEPTS: [(&str, &[&str]); 4] = [
    ("revenue", &["revenue", "sales", "income", "earnings"]),
    ("cost", &["cost", "expense", "expenditure", "spending"]),
    ("profit", &["profit", "margin", "earnings", "net income"]),
    ("marketing", &["marketing", "advertising", "promotion", "campaign"]),
];

/// Classifier output, before request parameters are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedQuery {
    /// Detected intent
    pub intent: Intent,
    /// Business concepts mentioned, deduplicated
    pub concepts: Vec<String>,
    /// Filters keyed by field
    pub filters: BTreeMap<String, QueryFilter>,
}

impl ClassifiedQuery {
    /// Attach request parameters, producing a translatable query.
    pub fn into_parsed(self, parameters: Map<String, Value>) -> ParsedQuery {
        ParsedQuery {
            intent: self.intent,
            filters: self.filters,
            concepts: self.concepts,
            parameters,
        }
    }
}

/// Classifies question text.
pub trait IntentClassifier: Send + Sync {
    /// Classify one question.
    fn classify(&self, text: &str) -> ClassifiedQuery;
}

/// Keyword-driven classifier.
///
/// Intent keywords are checked as case-insensitive substrings in a fixed
/// order: find words, then impact words, then dependency words. Text with
/// none of them is a `GENERAL_QUERY`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    fn intent(text: &str) -> Intent {
        let contains_any = |words: &[&str]| words.iter().any(|w| text.contains(w));
        if contains_any(&FIND_KEYWORDS) {
            Intent::FindEntities
        } else if contains_any(&IMPACT_KEYWORDS) {
            Intent::ImpactAnalysis
        } else if contains_any(&DEPENDENCY_KEYWORDS) {
            Intent::AnalyzeDependencies
        } else {
            Intent::GeneralQuery
        }
    }

    fn concepts(text: &str) -> Vec<String> {
        CONCEPTS
            .iter()
            .filter(|(_, words)| words.iter().any(|w| text.contains(w)))
            .map(|(concept, _)| (*concept).to_string())
            .collect()
    }

    fn filters(original: &str) -> BTreeMap<String, QueryFilter> {
        let tokens: Vec<&str> = TOKEN.find_iter(original).map(|m| m.as_str()).collect();
        let mut filters = BTreeMap::new();
        for window in tokens.windows(3) {
            let [field, operator, value] = window else {
                continue;
            };
            if ComparisonOp::parse(operator).is_none() || ComparisonOp::parse(field).is_some() {
                continue;
            }
            filters.insert(
                (*field).to_string(),
                QueryFilter {
                    field: (*field).to_string(),
                    operator: (*operator).to_string(),
                    value: token_value(value),
                },
            );
        }
        filters
    }
}

/// Numeric tokens become JSON numbers; anything else stays text.
fn token_value(token: &str) -> Value {
    if let Ok(int) = token.parse::<i64>() {
        return Value::from(int);
    }
    token
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map_or_else(|| Value::from(token), Value::Number)
}

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> ClassifiedQuery {
        let lower = text.to_lowercase();
        let classified = ClassifiedQuery {
            intent: Self::intent(&lower),
            concepts: Self::concepts(&lower),
            filters: Self::filters(text),
        };
        tracing::debug!(
            intent = %classified.intent,
            concepts = ?classified.concepts,
            filters = classified.filters.len(),
            "Classified query"
        );
        classified
    }
}
