//! Engine types
//!
//! Run configuration, run context, and the run summary.

use crate::auth::AuthProvider;
use crate::state::StateManager;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Maximum number of resources fetched concurrently
    pub max_workers: usize,
    /// Resources to load; their upstreams are fetched too. `None` loads every
    /// selected resource.
    pub resources: Option<Vec<String>>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            resources: None,
        }
    }
}

impl RunConfig {
    /// Set the worker limit
    #[must_use]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Restrict the run to `resources` (plus their upstreams)
    #[must_use]
    pub fn with_resources(mut self, resources: Vec<String>) -> Self {
        self.resources = Some(resources);
        self
    }
}

/// Everything a run shares across resources
#[derive(Clone)]
pub struct RunContext {
    /// Credential source for every request
    pub auth: Arc<AuthProvider>,
    /// Persisted watermarks
    pub state: StateManager,
    /// Run-level cancellation
    pub cancel: CancellationToken,
}

impl RunContext {
    /// Create a context with a fresh cancellation token
    pub fn new(auth: Arc<AuthProvider>, state: StateManager) -> Self {
        Self {
            auth,
            state,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an external cancellation token
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("auth", &self.auth.config().kind())
            .field("state", &self.state.path())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

// ============================================================================
// Run summary
// ============================================================================

/// Lifecycle of one resource within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Waiting for upstreams or a worker
    Pending,
    /// Requests in flight
    Fetching,
    /// Completed
    Done,
    /// Failed; the watermark was not committed
    Failed,
    /// Not fetched because an upstream yielded nothing or did not complete
    Skipped,
}

impl ResourceStatus {
    /// Whether the resource reached a final state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Fetching => "FETCHING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        };
        f.pad(s)
    }
}

/// Result of one resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceOutcome {
    /// Resource name
    pub name: String,
    /// Final status
    pub status: ResourceStatus,
    /// Records loaded (distinct keys for merge)
    pub records: u64,
    /// Watermark after the run (the stored one if nothing was committed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_cursor: Option<Value>,
    /// Failure or skip reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Pages processed
    pub pages: u64,
    /// HTTP requests issued (including auth retries)
    pub requests: u64,
    /// Responses dropped by an ignore rule
    pub ignored: u64,
    /// Whether records went to the destination
    pub loaded: bool,
}

impl ResourceOutcome {
    /// A pending outcome
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ResourceStatus::Pending,
            records: 0,
            final_cursor: None,
            error: None,
            pages: 0,
            requests: 0,
            ignored: 0,
            loaded: true,
        }
    }

    /// Mark skipped with a reason
    pub fn skip(&mut self, reason: impl Into<String>) {
        self.status = ResourceStatus::Skipped;
        self.error = Some(reason.into());
    }

    /// Mark failed with a reason
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = ResourceStatus::Failed;
        self.error = Some(reason.into());
    }
}

/// Per-resource results of a run, in fetch order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Pipeline name
    pub pipeline: String,
    /// Outcomes in fetch order
    pub resources: Vec<ResourceOutcome>,
    /// Wall time in milliseconds
    pub duration_ms: u64,
}

impl RunSummary {
    /// Outcome of one resource
    pub fn outcome(&self, name: &str) -> Option<&ResourceOutcome> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Whether any resource failed
    pub fn has_failures(&self) -> bool {
        self.resources
            .iter()
            .any(|r| r.status == ResourceStatus::Failed)
    }

    /// Records loaded across all resources
    pub fn total_records(&self) -> u64 {
        self.resources
            .iter()
            .filter(|r| r.loaded)
            .map(|r| r.records)
            .sum()
    }

    /// Number of resources with `status`
    pub fn count(&self, status: ResourceStatus) -> usize {
        self.resources.iter().filter(|r| r.status == status).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Pipeline '{}': {} done, {} failed, {} skipped, {} records in {:.1}s",
            self.pipeline,
            self.count(ResourceStatus::Done),
            self.count(ResourceStatus::Failed),
            self.count(ResourceStatus::Skipped),
            self.total_records(),
            self.duration_ms as f64 / 1000.0
        )?;

        let width = self
            .resources
            .iter()
            .map(|r| r.name.len())
            .max()
            .unwrap_or(0);

        for r in &self.resources {
            write!(
                f,
                "  {:<width$}  {:<8} {:>8} records {:>5} pages",
                r.name, r.status, r.records, r.pages
            )?;
            if let Some(cursor) = &r.final_cursor {
                write!(f, "  cursor={cursor}")?;
            }
            if !r.loaded {
                write!(f, "  (not loaded)")?;
            }
            if let Some(error) = &r.error {
                write!(f, "  {error}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
