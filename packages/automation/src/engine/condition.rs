//! Condition block evaluation against the run variables.

use serde_json::{Map, Value as JsonValue};

use crate::models::{ConditionConfig, ConditionOperator};
use crate::template;

/// Evaluate a condition block. Numeric comparisons cast both sides to f64
/// (numeric strings count); `contains` is a substring match on string-cast
/// values; unknown operators pass.
pub fn evaluate(config: &ConditionConfig, variables: &Map<String, JsonValue>) -> bool {
    let actual = template::lookup_path(variables, &config.field);

    match config.operator {
        ConditionOperator::Equals => strings_equal(actual, &config.value),
        ConditionOperator::NotEquals => !strings_equal(actual, &config.value),
        ConditionOperator::Contains => match actual {
            Some(actual) => template::value_to_string(actual)
                .contains(&template::value_to_string(&config.value)),
            None => false,
        },
        ConditionOperator::GreaterThan => numeric(actual, &config.value)
            .map(|(a, b)| a > b)
            .unwrap_or(false),
        ConditionOperator::LessThan => numeric(actual, &config.value)
            .map(|(a, b)| a < b)
            .unwrap_or(false),
        ConditionOperator::Exists => matches!(actual, Some(value) if !value.is_null()),
        ConditionOperator::NotExists => !matches!(actual, Some(value) if !value.is_null()),
        ConditionOperator::Other => true,
    }
}

fn strings_equal(actual: Option<&JsonValue>, expected: &JsonValue) -> bool {
    match actual {
        Some(actual) => template::value_to_string(actual) == template::value_to_string(expected),
        None => false,
    }
}

fn numeric(actual: Option<&JsonValue>, expected: &JsonValue) -> Option<(f64, f64)> {
    Some((as_f64(actual?)?, as_f64(expected)?))
}

fn as_f64(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
