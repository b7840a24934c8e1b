//! Execution engine module
//!
//! Dependency-ordered, bounded-concurrency orchestration of a pipeline run.
//!
//! # Overview
//!
//! The engine module provides:
//! - `Pipeline` - Runs a validated `Source` against a sink
//! - `RunConfig` / `RunContext` - Worker limit, resource selection, shared auth, state, cancellation
//! - `RunSummary` - Per-resource outcomes, serializable and printable
//!
//! Each resource has a counter of unfinished upstreams; it becomes eligible
//! at zero and runs on a worker from a bounded pool. Resource failures are
//! captured in the summary; only sink failures abort the run.

mod fetch;
mod types;

pub use types::{ResourceOutcome, ResourceStatus, RunConfig, RunContext, RunSummary};

use crate::decode::JsonDecoder;
use crate::error::{Error, Result};
use crate::graph::{DependencyGraph, ParamResolver, ResolvedParams};
use crate::http::HttpClient;
use crate::incremental::CursorTracker;
use crate::loader::{ResourceSpec, Source};
use crate::sink::Sink;
use crate::types::WriteDisposition;
use fetch::{fetch_resource, FetchContext, FetchReport, ResourceJob};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// A validated source bound to an HTTP client and a sink
pub struct Pipeline {
    /// Validated pipeline
    source: Arc<Source>,
    /// HTTP client shared by every resource
    client: Arc<HttpClient>,
    /// Destination
    sink: Arc<dyn Sink>,
    /// Run configuration
    config: RunConfig,
}

impl Pipeline {
    /// Create a pipeline with an HTTP client built from the source's settings
    pub fn new(source: Source, sink: Arc<dyn Sink>) -> Result<Self> {
        let client = HttpClient::with_config(source.client.http_config())?;
        Ok(Self::with_client(source, client, sink))
    }

    /// Create a pipeline with an explicit HTTP client
    pub fn with_client(source: Source, client: HttpClient, sink: Arc<dyn Sink>) -> Self {
        Self {
            source: Arc::new(source),
            client: Arc::new(client),
            sink,
            config: RunConfig::default(),
        }
    }

    /// Set run configuration
    #[must_use]
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// The source being run
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Run configuration
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Resources fetched by this run, in fetch order, with whether each is
    /// loaded into the sink.
    pub fn plan(&self) -> Result<Vec<(String, bool)>> {
        let graph = &self.source.graph;
        let loaded: HashSet<String> = match &self.config.resources {
            Some(selected) => {
                for name in selected {
                    if !graph.contains(name) {
                        return Err(Error::config(format!("Unknown resource '{name}'")));
                    }
                }
                selected.iter().cloned().collect()
            }
            None => self
                .source
                .resources
                .iter()
                .filter(|r| r.selected)
                .map(|r| r.name.clone())
                .collect(),
        };

        let roots: Vec<String> = graph
            .names()
            .iter()
            .filter(|n| loaded.contains(*n))
            .cloned()
            .collect();
        let active: HashSet<String> = graph.with_upstreams(&roots)?.into_iter().collect();

        Ok(graph
            .fetch_order()
            .into_iter()
            .filter(|name| active.contains(*name))
            .map(|name| (name.to_string(), loaded.contains(name)))
            .collect())
    }

    /// Run the pipeline.
    ///
    /// Returns the summary of every planned resource; fails only when the sink
    /// fails or the selection is invalid.
    pub async fn run(&self, ctx: &RunContext) -> Result<RunSummary> {
        let start = Instant::now();
        let plan = self.plan()?;
        let graph = &self.source.graph;

        info!(
            pipeline = %self.source.name,
            resources = plan.len(),
            workers = self.config.max_workers,
            "Starting run"
        );

        let order: Vec<String> = plan.iter().map(|(name, _)| name.clone()).collect();
        let load: HashMap<String, bool> = plan.into_iter().collect();

        let mut outcomes: HashMap<String, ResourceOutcome> = order
            .iter()
            .map(|name| {
                let mut outcome = ResourceOutcome::new(name);
                outcome.loaded = load.get(name).copied().unwrap_or(true);
                (name.clone(), outcome)
            })
            .collect();
        let mut waiting: HashMap<String, usize> = order
            .iter()
            .map(|name| {
                let deps = graph
                    .dependencies(name)
                    .into_iter()
                    .filter(|d| load.contains_key(*d))
                    .count();
                (name.clone(), deps)
            })
            .collect();
        let mut ready: VecDeque<String> = order
            .iter()
            .filter(|name| waiting.get(*name) == Some(&0))
            .cloned()
            .collect();
        let mut upstream_records: HashMap<String, Vec<Value>> = HashMap::new();

        // Cancelled by the caller, or by us when the sink fails
        let run_cancel = ctx.cancel.child_token();
        let fetch_ctx = FetchContext {
            client: Arc::clone(&self.client),
            auth: Arc::clone(&ctx.auth),
            sink: Arc::clone(&self.sink),
            state: ctx.state.clone(),
            cancel: run_cancel.clone(),
        };
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let mut join_set: JoinSet<FetchReport> = JoinSet::new();

        loop {
            while let Some(name) = ready.pop_front() {
                if run_cancel.is_cancelled() {
                    ready.push_front(name);
                    break;
                }
                let Some(spec) = self.source.resource(&name) else {
                    continue;
                };

                let param_sets = ParamResolver::resolve(&spec.resolve, &upstream_records);
                if let Some(outcome) = outcomes.get_mut(&name) {
                    outcome.status = ResourceStatus::Fetching;
                }
                Self::release_records(&mut upstream_records, &outcomes, graph);
                if param_sets.is_empty() {
                    let upstreams = spec.upstreams().join(", ");
                    info!(resource = %name, "Skipping, upstream {upstreams} yielded no records");
                    if let Some(outcome) = outcomes.get_mut(&name) {
                        outcome.skip(format!("upstream {upstreams} yielded no records"));
                    }
                    self.release_dependents(&name, true, &mut waiting, &mut ready, &mut outcomes);
                    continue;
                }

                let stored = ctx.state.get_cursor(&name).await;
                let keep_records = graph
                    .dependents(&name)
                    .iter()
                    .any(|d| load.contains_key(*d));
                let job = match self.job(
                    spec,
                    param_sets,
                    stored,
                    load.get(&name).copied().unwrap_or(true),
                    keep_records,
                ) {
                    Ok(job) => job,
                    Err(e) => {
                        if let Some(outcome) = outcomes.get_mut(&name) {
                            outcome.fail(e.to_string());
                        }
                        self.release_dependents(
                            &name,
                            true,
                            &mut waiting,
                            &mut ready,
                            &mut outcomes,
                        );
                        continue;
                    }
                };

                let permit_pool = Arc::clone(&semaphore);
                let task_ctx = fetch_ctx.clone();
                join_set.spawn(async move {
                    let _permit = permit_pool.acquire_owned().await;
                    fetch_resource(task_ctx, job).await
                });
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };

            let report = match joined {
                Ok(report) => report,
                Err(join_err) => {
                    join_set.abort_all();
                    return Err(Error::Other(format!("Resource task panicked: {join_err}")));
                }
            };

            if let Some(fatal) = report.fatal {
                warn!(resource = %report.outcome.name, "Sink failure, aborting run: {fatal}");
                run_cancel.cancel();
                join_set.abort_all();
                while join_set.join_next().await.is_some() {}
                return Err(fatal);
            }

            let name = report.outcome.name.clone();
            let succeeded = report.outcome.status == ResourceStatus::Done;
            if succeeded && !report.records.is_empty() {
                upstream_records.insert(name.clone(), report.records);
            }
            outcomes.insert(name.clone(), report.outcome);

            // Dependents of a cancelled run stay unfinished
            if run_cancel.is_cancelled() {
                continue;
            }
            self.release_dependents(&name, !succeeded, &mut waiting, &mut ready, &mut outcomes);
            Self::release_records(&mut upstream_records, &outcomes, graph);
        }

        // Whatever never started was cut off by cancellation
        for outcome in outcomes.values_mut() {
            if !outcome.status.is_terminal() {
                outcome.fail("cancelled");
            }
        }

        let summary = RunSummary {
            pipeline: self.source.name.clone(),
            resources: order
                .iter()
                .filter_map(|name| outcomes.remove(name))
                .collect(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            pipeline = %summary.pipeline,
            records = summary.total_records(),
            failed = summary.count(ResourceStatus::Failed),
            "Run finished"
        );
        Ok(summary)
    }

    /// Assemble the job of one resource
    fn job(
        &self,
        spec: &ResourceSpec,
        param_sets: Vec<ResolvedParams>,
        stored: Option<Value>,
        load: bool,
        keep_records: bool,
    ) -> Result<ResourceJob> {
        let paginator = spec
            .paginator
            .as_ref()
            .unwrap_or(&self.source.client.paginator)
            .build();

        let mut tracker = CursorTracker::new(&spec.name, spec.incremental.clone(), stored);
        if spec.write_disposition == WriteDisposition::Merge {
            tracker = tracker.with_primary_key(spec.primary_key.clone());
        }

        Ok(ResourceJob {
            spec: spec.clone(),
            paginator,
            policy: spec.policy()?,
            decoder: JsonDecoder::from_selector(spec.data_selector.as_deref()),
            param_sets,
            tracker,
            load,
            keep_records,
        })
    }

    /// Drop upstream records once no dependent is left to resolve from them
    fn release_records(
        upstream_records: &mut HashMap<String, Vec<Value>>,
        outcomes: &HashMap<String, ResourceOutcome>,
        graph: &DependencyGraph,
    ) {
        upstream_records.retain(|upstream, _| {
            graph.dependents(upstream).iter().any(|dependent| {
                outcomes
                    .get(*dependent)
                    .is_some_and(|o| o.status == ResourceStatus::Pending)
            })
        });
    }

    /// Decrement the counters of `name`'s dependents; skip them when `name`
    /// did not complete.
    fn release_dependents(
        &self,
        name: &str,
        upstream_incomplete: bool,
        waiting: &mut HashMap<String, usize>,
        ready: &mut VecDeque<String>,
        outcomes: &mut HashMap<String, ResourceOutcome>,
    ) {
        let reason = match outcomes.get(name).map(|o| o.status) {
            Some(ResourceStatus::Failed) => format!("upstream '{name}' failed"),
            _ => format!("upstream '{name}' was skipped"),
        };

        for dependent in self.source.graph.dependents(name) {
            let Some(count) = waiting.get_mut(dependent) else {
                continue;
            };

            if upstream_incomplete {
                if let Some(outcome) = outcomes.get_mut(dependent) {
                    if outcome.status == ResourceStatus::Pending {
                        debug!(
                            resource = %dependent,
                            upstream = %name,
                            "Upstream did not complete"
                        );
                        outcome.skip(reason.clone());
                    }
                }
            }

            *count = count.saturating_sub(1);
            if *count > 0 {
                continue;
            }

            let skipped = outcomes
                .get(dependent)
                .is_some_and(|o| o.status == ResourceStatus::Skipped);
            if skipped {
                let dependent = dependent.to_string();
                self.release_dependents(&dependent, true, waiting, ready, outcomes);
            } else {
                ready.push_back(dependent.to_string());
            }
        }
    }
}
