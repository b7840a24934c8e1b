//! Common types used throughout restload
//!
//! This module contains shared type definitions, type aliases,
//! and utility functions used across multiple modules.

use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::PUT => reqwest::Method::PUT,
            Method::PATCH => reqwest::Method::PATCH,
            Method::DELETE => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Write Disposition
// ============================================================================

/// How newly fetched records combine with data already at the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisposition {
    /// Full overwrite on every run
    Replace,
    /// Append new records, no dedup
    #[default]
    Append,
    /// Upsert by primary key
    Merge,
}

impl std::fmt::Display for WriteDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WriteDisposition::Replace => "replace",
            WriteDisposition::Append => "append",
            WriteDisposition::Merge => "merge",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Utilities
// ============================================================================

/// Look up a value by dotted path (`response.next_page_token`, `$.data.id`).
///
/// Numeric segments index into arrays.
pub fn lookup_path<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() || path == "$" {
        return Some(value);
    }

    let mut current = value;
    for part in path.split('.') {
        current = match current {
            JsonValue::Object(map) => map.get(part)?,
            JsonValue::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render a scalar JSON value as a request parameter.
///
/// Strings are used verbatim; objects, arrays, and null have no parameter form.
pub fn scalar_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Primary key of a record as one string.
///
/// A single-column key is the column's scalar form; a composite key is the
/// JSON array of its parts. `None` when any key column is missing or null.
pub fn record_key(record: &JsonValue, primary_key: &[String]) -> Option<String> {
    match primary_key {
        [] => None,
        [column] => lookup_path(record, column).and_then(scalar_to_string),
        columns => {
            let parts = columns
                .iter()
                .map(|c| lookup_path(record, c).filter(|v| !v.is_null()).cloned())
                .collect::<Option<Vec<_>>>()?;
            Some(JsonValue::Array(parts).to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_conversion() {
        let get: reqwest::Method = Method::GET.into();
        assert_eq!(reqwest::Method::GET, get);
        assert_eq!(Method::POST.to_string(), "POST");
    }

    #[test]
    fn test_write_disposition_serde() {
        let mode: WriteDisposition = serde_json::from_str("\"merge\"").unwrap();
        assert_eq!(mode, WriteDisposition::Merge);

        let json = serde_json::to_string(&WriteDisposition::Replace).unwrap();
        assert_eq!(json, "\"replace\"");
        assert_eq!(WriteDisposition::default(), WriteDisposition::Append);
    }

    #[test]
    fn test_lookup_path() {
        let value = json!({"response": {"next_page_token": "abc", "items": [{"id": 7}]}});
        assert_eq!(
            lookup_path(&value, "response.next_page_token"),
            Some(&json!("abc"))
        );
        assert_eq!(
            lookup_path(&value, "$.response.next_page_token"),
            Some(&json!("abc"))
        );
        assert_eq!(lookup_path(&value, "response.items.0.id"), Some(&json!(7)));
        assert_eq!(lookup_path(&value, "response.missing"), None);
        assert_eq!(lookup_path(&value, "$"), Some(&value));
    }

    #[test]
    fn test_scalar_to_string() {
        assert_eq!(scalar_to_string(&json!("x")), Some("x".to_string()));
        assert_eq!(scalar_to_string(&json!(42)), Some("42".to_string()));
        assert_eq!(scalar_to_string(&json!(true)), Some("true".to_string()));
        assert_eq!(scalar_to_string(&json!(null)), None);
        assert_eq!(scalar_to_string(&json!({"a": 1})), None);
    }

    #[test]
    fn test_record_key() {
        let record = json!({"id": 7, "org": "acme", "nested": {"n": "x"}});
        assert_eq!(record_key(&record, &["id".into()]), Some("7".to_string()));
        assert_eq!(
            record_key(&record, &["org".into(), "nested.n".into()]),
            Some(r#"["acme","x"]"#.to_string())
        );
        assert_eq!(record_key(&record, &["missing".into()]), None);
        assert_eq!(record_key(&record, &["id".into(), "missing".into()]), None);
        assert_eq!(record_key(&record, &[]), None);
    }
}
