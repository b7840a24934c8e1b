//! Per-run cursor tracker

use super::types::{compare_cursor, IncrementalSpec, LastValueFunc};
use crate::types::{lookup_path, record_key, scalar_to_string};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

/// Watermark and merge-key bookkeeping for one resource during one run.
///
/// Created fresh at run start; the new watermark it computes is only
/// committed by the caller once the resource finished without failure.
#[derive(Debug, Clone)]
pub struct CursorTracker {
    /// Resource name
    resource: String,
    /// Incremental spec, if the resource is incremental
    spec: Option<IncrementalSpec>,
    /// Watermark the run started from
    start: Option<Value>,
    /// Best cursor value seen this run
    last: Option<Value>,
    /// Primary key columns (merge only)
    primary_key: Vec<String>,
    /// Keys seen this run
    seen_keys: HashSet<String>,
}

impl CursorTracker {
    /// Start tracking from the stored watermark, falling back to the configured
    /// initial value.
    pub fn new(
        resource: impl Into<String>,
        spec: Option<IncrementalSpec>,
        stored: Option<Value>,
    ) -> Self {
        let start = stored
            .filter(|v| !v.is_null())
            .or_else(|| spec.as_ref().and_then(|s| s.initial_value.clone()));
        Self {
            resource: resource.into(),
            spec,
            start,
            last: None,
            primary_key: Vec::new(),
            seen_keys: HashSet::new(),
        }
    }

    /// A tracker that only counts keys (no incremental spec)
    pub fn disabled(resource: impl Into<String>) -> Self {
        Self::new(resource, None, None)
    }

    /// Track primary keys for merge dedup
    #[must_use]
    pub fn with_primary_key(mut self, primary_key: Vec<String>) -> Self {
        self.primary_key = primary_key;
        self
    }

    /// Resource name
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Whether the resource is incremental
    pub fn is_incremental(&self) -> bool {
        self.spec.is_some()
    }

    /// Watermark the run started from
    pub fn start_value(&self) -> Option<&Value> {
        self.start.as_ref()
    }

    /// Query parameters carrying the starting watermark
    pub fn filter_params(&self) -> Vec<(String, String)> {
        match (&self.spec, &self.start) {
            (Some(spec), Some(start)) => scalar_to_string(start)
                .map(|value| vec![(spec.param.clone(), value)])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Whether `record` is at or past the starting watermark.
    ///
    /// Records without a comparable cursor value are admitted.
    pub fn admits(&self, record: &Value) -> bool {
        let (Some(spec), Some(start)) = (&self.spec, &self.start) else {
            return true;
        };
        let Some(value) = lookup_path(record, &spec.cursor_path) else {
            return true;
        };

        match (compare_cursor(value, start), spec.last_value_func) {
            (Some(Ordering::Less), LastValueFunc::Max) => false,
            (Some(Ordering::Greater), LastValueFunc::Min) => false,
            _ => true,
        }
    }

    /// Feed one record's cursor value into the watermark
    pub fn observe(&mut self, record: &Value) {
        let Some(spec) = &self.spec else {
            return;
        };
        let Some(value) = lookup_path(record, &spec.cursor_path) else {
            return;
        };
        if compare_cursor(value, value).is_none() {
            debug!(resource = %self.resource, cursor = %value, "Ignoring non-scalar cursor value");
            return;
        }

        if is_better(value, self.last.as_ref(), spec.last_value_func) {
            self.last = Some(value.clone());
        }
    }

    /// Record a merge key; `false` if this run already saw it.
    ///
    /// Records without a complete key are always counted.
    pub fn observe_key(&mut self, record: &Value) -> bool {
        match record_key(record, &self.primary_key) {
            Some(key) => self.seen_keys.insert(key),
            None => true,
        }
    }

    /// Number of distinct keys seen this run
    pub fn distinct_keys(&self) -> usize {
        self.seen_keys.len()
    }

    /// The watermark to commit if the resource succeeds
    pub fn finalize(&self) -> Option<Value> {
        let spec = self.spec.as_ref()?;
        match (&self.start, &self.last) {
            (start, Some(last)) if is_better(last, start.as_ref(), spec.last_value_func) => {
                Some(last.clone())
            }
            (start, last) => start.clone().or_else(|| last.clone()),
        }
    }
}

/// Whether `candidate` beats `current` under `func`
fn is_better(candidate: &Value, current: Option<&Value>, func: LastValueFunc) -> bool {
    let Some(current) = current else {
        return true;
    };
    matches!(
        (compare_cursor(candidate, current), func),
        (Some(Ordering::Greater), LastValueFunc::Max) | (Some(Ordering::Less), LastValueFunc::Min)
    )
}
