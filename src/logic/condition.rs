//! Condition evaluator
//!
//! Applies a fixed set of operators to a dotted-path field lookup over a flat
//! JSON event record. Missing paths resolve to null, and every operator
//! treats null as a non-match; malformed conditions never raise an error.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

use crate::models::{ConditionOperator, RuleCondition};

static NULL_VALUE: Value = Value::Null;

/// Resolve `a.b.c` against a JSON object, yielding null for absent segments
pub fn lookup_path<'a>(record: &'a Value, path: &str) -> &'a Value {
    let mut current = record;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return &NULL_VALUE,
        }
    }
    current
}

/// Evaluates rule conditions against event records.
///
/// Owns a compiled-regex cache so repeated evaluation of the same pattern
/// does not recompile. Invalid patterns evaluate to non-match.
pub struct ConditionEvaluator {
    regex_cache: HashMap<String, Regex>,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self {
            regex_cache: HashMap::new(),
        }
    }

    /// `evaluate(condition, record) -> bool`
    pub fn evaluate(&mut self, condition: &RuleCondition, record: &Value) -> bool {
        let field = lookup_path(record, &condition.field);
        if field.is_null() {
            return false;
        }

        match condition.operator {
            ConditionOperator::Equals => *field == condition.value,

            ConditionOperator::Contains => {
                match (value_as_string(field), value_as_string(&condition.value)) {
                    (Some(haystack), Some(needle)) => haystack.contains(&needle),
                    _ => false,
                }
            }

            ConditionOperator::Regex => {
                let Some(text) = value_as_string(field) else {
                    return false;
                };
                let Some(pattern) = condition.value.as_str() else {
                    return false;
                };
                self.regex_match(pattern, &text)
            }

            ConditionOperator::Greater => {
                match (value_as_f64(field), value_as_f64(&condition.value)) {
                    (Some(lhs), Some(rhs)) => lhs > rhs,
                    _ => false,
                }
            }

            ConditionOperator::Less => {
                match (value_as_f64(field), value_as_f64(&condition.value)) {
                    (Some(lhs), Some(rhs)) => lhs < rhs,
                    _ => false,
                }
            }

            ConditionOperator::In => condition
                .value
                .as_array()
                .map_or(false, |candidates| candidates.iter().any(|v| v == field)),

            ConditionOperator::NotIn => condition
                .value
                .as_array()
                .map_or(false, |candidates| !candidates.iter().any(|v| v == field)),
        }
    }

    fn regex_match(&mut self, pattern: &str, text: &str) -> bool {
        if !self.regex_cache.contains_key(pattern) {
            match Regex::new(pattern) {
                Ok(re) => {
                    self.regex_cache.insert(pattern.to_string(), re);
                }
                Err(err) => {
                    tracing::warn!("invalid regex pattern '{}': {}", pattern, err);
                    return false;
                }
            }
        }

        self.regex_cache
            .get(pattern)
            .map_or(false, |re| re.is_match(text))
    }
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// String cast used by `contains` and `regex` (numbers and bools stringify)
fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric cast used by `greater`/`less` (numeric strings parse)
fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
