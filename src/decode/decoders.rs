//! JSON record decoder

use crate::error::{Error, Result};
use serde_json::Value;
use tracing::debug;

/// Envelope keys that usually hold the record array, in preference order
pub const PREFERRED_RECORD_KEYS: &[&str] = &["results", "data", "items", "records", "entries"];

/// JSON decoder with optional record selector
#[derive(Debug, Clone, Default)]
pub struct JsonDecoder {
    /// Path to the records inside the body
    data_selector: Option<String>,
}

impl JsonDecoder {
    /// Create a decoder that auto-detects the record array
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder reading records at `selector`
    pub fn with_selector(selector: impl Into<String>) -> Self {
        Self {
            data_selector: Some(selector.into()),
        }
    }

    /// Create a decoder from an optional selector
    pub fn from_selector(selector: Option<&str>) -> Self {
        Self {
            data_selector: selector.map(str::to_string),
        }
    }

    /// The configured selector
    pub fn selector(&self) -> Option<&str> {
        self.data_selector.as_deref()
    }

    /// Parse a body and extract its records
    pub fn decode(&self, body: &str) -> Result<Vec<Value>> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| Error::decode(format!("Failed to parse JSON: {e}")))?;
        self.extract(&value)
    }

    /// Extract records from an already parsed body
    pub fn extract(&self, value: &Value) -> Result<Vec<Value>> {
        match &self.data_selector {
            // Only use jsonpath-rust for wildcard patterns
            Some(path) if path.contains('*') => extract_with_jsonpath(value, path),
            Some(path) => match extract_simple_path(value, path) {
                Some(Value::Array(arr)) => Ok(arr),
                Some(Value::Null) | None => Ok(vec![]),
                Some(v) => Ok(vec![v]),
            },
            None => Ok(detect_records(value)),
        }
    }
}

/// Find the records in an envelope of unknown shape.
///
/// A top-level array is the record list. For an object, the preferred keys
/// win, then the only array-valued field; otherwise the object is itself a
/// single record.
fn detect_records(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(arr) => arr.clone(),
        Value::Object(map) => {
            for key in PREFERRED_RECORD_KEYS {
                if let Some(Value::Array(arr)) = map.get(*key) {
                    return arr.clone();
                }
            }

            let mut arrays = map.iter().filter(|(_, v)| v.is_array());
            match (arrays.next(), arrays.next()) {
                (Some((_, Value::Array(arr))), None) => arr.clone(),
                (Some(_), Some(_)) => {
                    debug!("Several array fields in response, treating it as one record");
                    vec![value.clone()]
                }
                _ => vec![value.clone()],
            }
        }
        Value::Null => vec![],
        // A bare scalar carries no record
        _ => vec![],
    }
}

/// Dotted path with optional `[n]` / `[-n]` indexing (`data.items[0].tags`)
fn extract_simple_path(value: &Value, path: &str) -> Option<Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() || path == "$" {
        return Some(value.clone());
    }

    let mut current = value;
    for part in path.split('.') {
        // Handle array indexing like "data[0]" or "items[-1]"
        if let Some(bracket_pos) = part.find('[') {
            let name = &part[..bracket_pos];
            let index_str = part[bracket_pos + 1..].strip_suffix(']')?;

            if !name.is_empty() {
                current = current.get(name)?;
            }

            let index = index_str.parse::<i64>().ok()?;
            let Value::Array(arr) = current else {
                return None;
            };
            let idx = if index < 0 {
                arr.len().checked_sub(index.unsigned_abs() as usize)?
            } else {
                index as usize
            };
            current = arr.get(idx)?;
        } else {
            current = match current {
                Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
    }

    Some(current.clone())
}

/// Full JSONPath extraction
fn extract_with_jsonpath(value: &Value, path: &str) -> Result<Vec<Value>> {
    use jsonpath_rust::JsonPath;

    let path = if path.starts_with('$') {
        path.to_string()
    } else {
        format!("$.{path}")
    };

    let jp = JsonPath::try_from(path.as_str())
        .map_err(|e| Error::json_path(format!("Invalid JSONPath: {e}")))?;

    match jp.find(value) {
        Value::Array(arr) => Ok(arr),
        Value::Null => Ok(vec![]),
        other => Ok(vec![other]),
    }
}
