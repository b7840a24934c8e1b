//! State types for tracking load progress
//!
//! These types are serialized to JSON and persisted between runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Complete state of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-resource state
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a resource
    pub fn get_resource(&self, resource: &str) -> Option<&ResourceState> {
        self.resources.get(resource)
    }

    /// Get mutable state for a resource, creating if needed
    pub fn get_resource_mut(&mut self, resource: &str) -> &mut ResourceState {
        self.resources.entry(resource.to_string()).or_default()
    }

    /// Get the watermark of a resource
    pub fn get_cursor(&self, resource: &str) -> Option<&Value> {
        self.resources.get(resource)?.cursor.as_ref()
    }

    /// Set the watermark of a resource
    pub fn set_cursor(&mut self, resource: &str, cursor: Value) {
        let entry = self.get_resource_mut(resource);
        entry.cursor = Some(cursor);
        entry.updated_at = Some(Utc::now());
    }
}

/// State for a single resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Incremental watermark
    #[serde(default)]
    pub cursor: Option<Value>,

    /// When the watermark was last committed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
