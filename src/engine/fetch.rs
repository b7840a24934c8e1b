//! Per-resource fetch loop
//!
//! One parameter set at a time, one page at a time: build the request, attach
//! credentials, send, classify, extract, feed the tracker, write to the sink,
//! and ask the paginator for the next request.

use super::types::{ResourceOutcome, ResourceStatus};
use crate::auth::AuthProvider;
use crate::decode::JsonDecoder;
use crate::error::{Error, Result};
use crate::graph::ResolvedParams;
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::incremental::CursorTracker;
use crate::loader::ResourceSpec;
use crate::pagination::{PageResponse, Paginator};
use crate::policy::{Classification, ResponsePolicy};
use crate::sink::{Sink, StreamHandle};
use crate::state::StateManager;
use crate::template::fill_path;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest API error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Shared handles every resource task needs
#[derive(Clone)]
pub(crate) struct FetchContext {
    pub client: Arc<HttpClient>,
    pub auth: Arc<AuthProvider>,
    pub sink: Arc<dyn Sink>,
    pub state: StateManager,
    pub cancel: CancellationToken,
}

/// Everything needed to fetch one resource
pub(crate) struct ResourceJob {
    pub spec: ResourceSpec,
    pub paginator: Arc<dyn Paginator>,
    pub policy: ResponsePolicy,
    pub decoder: JsonDecoder,
    pub param_sets: Vec<ResolvedParams>,
    pub tracker: CursorTracker,
    /// Write records to the sink (false for upstreams fetched only to resolve)
    pub load: bool,
    /// Keep records in memory for dependents
    pub keep_records: bool,
}

/// What a resource task hands back to the scheduler
pub(crate) struct FetchReport {
    pub outcome: ResourceOutcome,
    pub records: Vec<Value>,
    /// Sink failure that must abort the run
    pub fatal: Option<Error>,
}

#[derive(Debug, Default)]
struct Counters {
    pages: u64,
    requests: u64,
    records: u64,
    ignored: u64,
}

/// Fetch one resource to completion
pub(crate) async fn fetch_resource(ctx: FetchContext, job: ResourceJob) -> FetchReport {
    let ResourceJob {
        spec,
        paginator,
        policy,
        decoder,
        param_sets,
        mut tracker,
        load,
        keep_records,
    } = job;

    let mut outcome = ResourceOutcome::new(&spec.name);
    outcome.status = ResourceStatus::Fetching;
    outcome.loaded = load;
    outcome.final_cursor = tracker.start_value().cloned();

    info!(
        resource = %spec.name,
        parameter_sets = param_sets.len(),
        paginator = ?paginator,
        "Fetching resource"
    );

    let handle = if load {
        match ctx
            .sink
            .open(&spec.name, spec.write_disposition, &spec.primary_key)
            .await
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                outcome.fail(e.to_string());
                return FetchReport {
                    outcome,
                    records: Vec::new(),
                    fatal: Some(e),
                };
            }
        }
    } else {
        None
    };

    let mut counters = Counters::default();
    let mut kept = Vec::new();
    let pages = PageLoop {
        ctx: &ctx,
        spec: &spec,
        paginator: paginator.as_ref(),
        policy: &policy,
        decoder: &decoder,
        handle: handle.as_ref(),
    };

    let mut result = Ok(());
    for params in &param_sets {
        result = pages
            .run(params, &mut tracker, &mut counters, keep_records.then_some(&mut kept))
            .await;
        if result.is_err() {
            break;
        }
    }

    outcome.pages = counters.pages;
    outcome.requests = counters.requests;
    outcome.ignored = counters.ignored;
    outcome.records = counters.records;

    match result {
        Ok(()) => {
            if let Some(handle) = handle {
                match ctx.sink.close(handle).await {
                    Ok(stats) => debug!(resource = %spec.name, ?stats, "Closed sink stream"),
                    Err(e) => {
                        outcome.fail(e.to_string());
                        return FetchReport {
                            outcome,
                            records: Vec::new(),
                            fatal: Some(e),
                        };
                    }
                }

                // The watermark only moves once the records are committed
                if let Some(cursor) = tracker.finalize() {
                    if let Err(e) = ctx.state.set_cursor(&spec.name, cursor.clone()).await {
                        outcome.fail(e.to_string());
                        return FetchReport {
                            outcome,
                            records: Vec::new(),
                            fatal: None,
                        };
                    }
                    outcome.final_cursor = Some(cursor);
                }
            }

            outcome.status = ResourceStatus::Done;
            info!(
                resource = %spec.name,
                records = outcome.records,
                pages = outcome.pages,
                "Resource done"
            );
            FetchReport {
                outcome,
                records: kept,
                fatal: None,
            }
        }
        Err(e) => {
            if let Some(handle) = handle {
                if let Err(abort_err) = ctx.sink.abort(handle).await {
                    warn!(resource = %spec.name, "Failed to abort sink stream: {abort_err}");
                }
            }

            let reason = match &e {
                Error::Cancelled => "cancelled".to_string(),
                other => other.to_string(),
            };
            warn!(resource = %spec.name, "Resource failed: {reason}");
            outcome.fail(reason);

            FetchReport {
                outcome,
                records: Vec::new(),
                fatal: e.is_fatal().then_some(e),
            }
        }
    }
}

/// The page loop of one resource
struct PageLoop<'a> {
    ctx: &'a FetchContext,
    spec: &'a ResourceSpec,
    paginator: &'a dyn Paginator,
    policy: &'a ResponsePolicy,
    decoder: &'a JsonDecoder,
    handle: Option<&'a StreamHandle>,
}

impl PageLoop<'_> {
    /// Follow the pages of one parameter set
    async fn run(
        &self,
        params: &ResolvedParams,
        tracker: &mut CursorTracker,
        counters: &mut Counters,
        mut kept: Option<&mut Vec<Value>>,
    ) -> Result<()> {
        let mut next = Some(self.first_request(params, tracker)?);
        let parent_columns = params.parent_columns(&self.spec.include_from_parent);

        while let Some(request) = next.take() {
            if self.ctx.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let response = self.send(&request, counters).await?;
            counters.pages += 1;

            match self.policy.classify(response.status, &response.body) {
                Classification::Accept => {}
                Classification::IgnoreEmpty => {
                    info!(
                        resource = %self.spec.name,
                        status = response.status,
                        params = %params.label(),
                        "Response ignored"
                    );
                    counters.ignored += 1;
                    break;
                }
                Classification::Fail => {
                    return Err(Error::api(response.status, truncate(&response.body)));
                }
            }

            let body: Value = match serde_json::from_str(&response.body) {
                Ok(body) => body,
                Err(e) => {
                    warn!(resource = %self.spec.name, "Response is not JSON ({e}), stopping");
                    break;
                }
            };

            let records = self.decoder.extract(&body)?;
            let page_len = records.len();
            let mut batch = Vec::with_capacity(page_len);

            for mut record in records {
                if !tracker.admits(&record) {
                    continue;
                }
                tracker.observe(&record);
                if tracker.observe_key(&record) {
                    counters.records += 1;
                }
                if let Value::Object(map) = &mut record {
                    for (column, value) in &parent_columns {
                        map.insert(column.clone(), value.clone());
                    }
                }
                if let Some(kept) = kept.as_deref_mut() {
                    kept.push(record.clone());
                }
                batch.push(record);
            }

            debug!(
                resource = %self.spec.name,
                page = counters.pages,
                records = page_len,
                admitted = batch.len(),
                "Fetched page"
            );

            if let (Some(handle), false) = (self.handle, batch.is_empty()) {
                self.ctx.sink.write_batch(handle, batch).await?;
            }

            next = self
                .paginator
                .advance(&request, &PageResponse::new(&response, &body), page_len);
        }

        Ok(())
    }

    /// First request of a parameter set
    fn first_request(
        &self,
        params: &ResolvedParams,
        tracker: &CursorTracker,
    ) -> Result<HttpRequest> {
        let mut values: HashMap<String, String> = self
            .spec
            .path_params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        values.extend(params.as_map());

        let path = fill_path(&self.spec.path, &values)?;
        let mut request = HttpRequest::new(self.spec.method, self.ctx.client.url(&path));

        for (key, value) in &self.spec.params {
            request.set_query(key, value);
        }
        for (key, value) in tracker.filter_params() {
            request.set_query(key, value);
        }
        for (key, value) in &self.spec.headers {
            request.set_header(key, value);
        }

        self.paginator.prepare(&mut request);
        Ok(request)
    }

    /// Send with credentials; on a 401 refresh the credential once and retry
    async fn send(&self, request: &HttpRequest, counters: &mut Counters) -> Result<HttpResponse> {
        let mut authorized = request.clone();
        let credential = self.ctx.auth.apply(&mut authorized).await?;
        counters.requests += 1;
        let response = self.ctx.client.send(&authorized).await?;

        if response.status == 401 && self.ctx.auth.is_refreshable() {
            debug!(resource = %self.spec.name, "Unauthorized, refreshing credential");
            let fresh = self.ctx.auth.refresh(&credential).await?;
            let mut retry = request.clone();
            self.ctx.auth.attach(&mut retry, &fresh);
            counters.requests += 1;
            return self.ctx.client.send(&retry).await;
        }

        Ok(response)
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
