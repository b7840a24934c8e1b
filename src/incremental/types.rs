//! Incremental spec types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Which end of the cursor range is the watermark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastValueFunc {
    /// Keep the largest value seen (timestamps, ids)
    #[default]
    Max,
    /// Keep the smallest value seen
    Min,
}

/// Incremental loading spec of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementalSpec {
    /// Query parameter receiving the watermark (`since`)
    pub param: String,
    /// Dotted path to the cursor field in each record
    pub cursor_path: String,
    /// Watermark used when no state is stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<Value>,
    /// Comparison direction
    #[serde(default)]
    pub last_value_func: LastValueFunc,
}

impl IncrementalSpec {
    /// Create a `max` spec
    pub fn new(param: impl Into<String>, cursor_path: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            cursor_path: cursor_path.into(),
            initial_value: None,
            last_value_func: LastValueFunc::Max,
        }
    }

    /// Set the initial watermark
    #[must_use]
    pub fn with_initial_value(mut self, value: impl Into<Value>) -> Self {
        self.initial_value = Some(value.into());
        self
    }

    /// Set the comparison direction
    #[must_use]
    pub fn with_last_value_func(mut self, func: LastValueFunc) -> Self {
        self.last_value_func = func;
        self
    }
}

/// Natural ordering of cursor values.
///
/// Numbers compare numerically and strings lexicographically (which orders
/// ISO-8601 timestamps chronologically); numbers sort before strings. Other
/// JSON types are not cursors and have no ordering.
pub fn compare_cursor(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                Some(x.cmp(&y))
            } else {
                x.as_f64()?.partial_cmp(&y.as_f64()?)
            }
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Number(_), Value::String(_)) => Some(Ordering::Less),
        (Value::String(_), Value::Number(_)) => Some(Ordering::Greater),
        _ => None,
    }
}
