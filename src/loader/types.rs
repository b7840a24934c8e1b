//! Loader types
//!
//! Two layers: the `*Definition` types mirror the YAML surface and are only
//! used while parsing; `Source`, `ClientSpec` and `ResourceSpec` are the
//! validated, defaults-merged form the engine runs.

use crate::auth::AuthConfig;
use crate::error::Result;
use crate::graph::{DependencyGraph, ResolveRule};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::incremental::{IncrementalSpec, LastValueFunc};
use crate::pagination::PaginatorConfig;
use crate::policy::{ResponseAction, ResponsePolicy};
use crate::types::{Method, WriteDisposition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

// ============================================================================
// Pipeline Definition
// ============================================================================

/// Top-level pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineDefinition {
    /// Pipeline name, also the destination dataset
    #[serde(default)]
    pub name: Option<String>,
    /// Shared client settings
    pub client: ClientDefinition,
    /// Settings merged into every resource
    #[serde(default)]
    pub resource_defaults: ResourceDefaults,
    /// Resources to extract
    pub resources: Vec<ResourceEntry>,
}

/// Client settings shared by all resources
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClientDefinition {
    /// Base URL for all requests
    pub base_url: String,
    /// Authentication
    #[serde(default)]
    pub auth: Option<AuthDefinition>,
    /// Default paginator
    #[serde(default)]
    pub paginator: Option<PaginatorConfig>,
    /// Headers sent with every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// HTTP client knobs
    #[serde(default)]
    pub http: HttpDefinition,
}

/// Authentication, either typed or the `{token: ...}` bearer shorthand
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthDefinition {
    /// Fully typed strategy
    Typed(AuthConfig),
    /// Bearer token without a `type`
    Token {
        /// The bearer token
        token: String,
    },
}

impl AuthDefinition {
    /// The strategy this definition describes
    pub fn into_config(self) -> AuthConfig {
        match self {
            AuthDefinition::Typed(config) => config,
            AuthDefinition::Token { token } => AuthConfig::Bearer { token },
        }
    }
}

// ============================================================================
// HTTP Definition
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HttpDefinition {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Maximum retries
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Rate limit (requests per second)
    #[serde(default)]
    pub rate_limit_rps: Option<u32>,
    /// User agent
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpDefinition {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            rate_limit_rps: None,
            user_agent: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

// ============================================================================
// Resource Definition
// ============================================================================

/// A resource: either a bare name (path == name) or a full definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceEntry {
    /// Shorthand
    Name(String),
    /// Full definition
    Definition(Box<ResourceDefinition>),
}

impl ResourceEntry {
    /// Resource name
    pub fn name(&self) -> &str {
        match self {
            ResourceEntry::Name(name) => name,
            ResourceEntry::Definition(def) => &def.name,
        }
    }

    /// Expand the shorthand into a definition
    pub fn into_definition(self) -> ResourceDefinition {
        match self {
            ResourceEntry::Name(name) => ResourceDefinition {
                name,
                ..ResourceDefinition::default()
            },
            ResourceEntry::Definition(def) => *def,
        }
    }
}

/// Resource definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResourceDefinition {
    /// Unique resource name (also the destination table)
    pub name: String,
    /// Request settings
    #[serde(default)]
    pub endpoint: EndpointDefinition,
    /// Write disposition
    #[serde(default)]
    pub write_disposition: Option<WriteDisposition>,
    /// Primary key column(s)
    #[serde(default)]
    pub primary_key: Option<PrimaryKey>,
    /// Parent fields copied into each record
    #[serde(default)]
    pub include_from_parent: Vec<String>,
    /// Whether the resource is loaded (dependencies of selected resources
    /// are always fetched)
    #[serde(default)]
    pub selected: Option<bool>,
}

/// Settings merged into every resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResourceDefaults {
    /// Default request settings
    #[serde(default)]
    pub endpoint: EndpointDefinition,
    /// Default write disposition
    #[serde(default)]
    pub write_disposition: Option<WriteDisposition>,
    /// Default primary key
    #[serde(default)]
    pub primary_key: Option<PrimaryKey>,
}

/// Request settings of a resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EndpointDefinition {
    /// Path template (defaults to the resource name)
    #[serde(default)]
    pub path: Option<String>,
    /// HTTP method
    #[serde(default)]
    pub method: Option<Method>,
    /// Query / path parameters
    #[serde(default)]
    pub params: BTreeMap<String, ParamDefinition>,
    /// Extra headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Where records live in the response body
    #[serde(default)]
    pub data_selector: Option<String>,
    /// Paginator override
    #[serde(default)]
    pub paginator: Option<PaginatorConfig>,
    /// Response handling rules
    #[serde(default)]
    pub response_actions: Option<Vec<ResponseAction>>,
}

/// Primary key: one column or an ordered list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    /// Single column
    One(String),
    /// Composite key
    Many(Vec<String>),
}

impl PrimaryKey {
    /// Key columns in order
    pub fn columns(&self) -> Vec<String> {
        match self {
            PrimaryKey::One(col) => vec![col.clone()],
            PrimaryKey::Many(cols) => cols.clone(),
        }
    }
}

// ============================================================================
// Parameter Definition
// ============================================================================

/// A request parameter: a static scalar, or a value computed at run time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamDefinition {
    /// Resolved or incremental parameter
    Dynamic(DynamicParam),
    /// Static value
    Static(Value),
}

/// Parameters whose value is computed at run time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DynamicParam {
    /// Values taken from an upstream resource's records
    Resolve {
        /// Upstream resource
        resource: String,
        /// Dotted path into upstream records
        field: String,
    },
    /// Watermark of an incremental load
    Incremental {
        /// Dotted path of the cursor field in each record
        cursor_path: String,
        /// Watermark used when nothing is stored yet
        #[serde(default)]
        initial_value: Option<Value>,
        /// Which end of the range becomes the new watermark
        #[serde(default)]
        last_value_func: LastValueFunc,
    },
}

// ============================================================================
// Validated specs
// ============================================================================

/// Validated client settings
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSpec {
    /// Base URL
    pub base_url: String,
    /// Authentication strategy
    pub auth: AuthConfig,
    /// Default paginator
    pub paginator: PaginatorConfig,
    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,
    /// HTTP knobs
    pub http: HttpDefinition,
}

impl ClientSpec {
    /// HTTP client configuration for this client
    pub fn http_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(&self.base_url)
            .timeout(Duration::from_secs(self.http.timeout_secs))
            .max_retries(self.http.max_retries);

        if let Some(rps) = self.http.rate_limit_rps {
            builder = builder.rate_limit(RateLimiterConfig::per_second(rps));
        }
        if let Some(agent) = &self.http.user_agent {
            builder = builder.user_agent(agent);
        }
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }

        builder.build()
    }
}

/// A validated resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSpec {
    /// Unique name
    pub name: String,
    /// Path template with `{placeholder}`s
    pub path: String,
    /// HTTP method
    pub method: Method,
    /// Static query parameters
    pub params: Vec<(String, String)>,
    /// Static values for path placeholders
    pub path_params: BTreeMap<String, String>,
    /// Extra headers
    pub headers: BTreeMap<String, String>,
    /// How records combine with the destination table
    pub write_disposition: WriteDisposition,
    /// Primary key columns
    pub primary_key: Vec<String>,
    /// Incremental loading
    pub incremental: Option<IncrementalSpec>,
    /// Placeholders resolved from upstream resources
    pub resolve: Vec<ResolveRule>,
    /// Response handling rules
    pub response_actions: Vec<ResponseAction>,
    /// Paginator override
    pub paginator: Option<PaginatorConfig>,
    /// Record selector
    pub data_selector: Option<String>,
    /// Parent fields copied into each record
    pub include_from_parent: Vec<String>,
    /// Whether the resource is loaded
    pub selected: bool,
}

impl ResourceSpec {
    /// A GET resource whose path is its name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            method: Method::GET,
            params: Vec::new(),
            path_params: BTreeMap::new(),
            headers: BTreeMap::new(),
            write_disposition: WriteDisposition::default(),
            primary_key: Vec::new(),
            incremental: None,
            resolve: Vec::new(),
            response_actions: Vec::new(),
            paginator: None,
            data_selector: None,
            include_from_parent: Vec::new(),
            selected: true,
        }
    }

    /// Set the path template
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Add a static query parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add a resolve rule
    #[must_use]
    pub fn with_resolve(mut self, rule: ResolveRule) -> Self {
        self.resolve.push(rule);
        self
    }

    /// Set the write disposition and primary key
    #[must_use]
    pub fn with_disposition(mut self, disposition: WriteDisposition, primary_key: &[&str]) -> Self {
        self.write_disposition = disposition;
        self.primary_key = primary_key.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// Make the resource incremental
    #[must_use]
    pub fn with_incremental(mut self, spec: IncrementalSpec) -> Self {
        self.incremental = Some(spec);
        self
    }

    /// Add a response rule
    #[must_use]
    pub fn with_response_action(mut self, action: ResponseAction) -> Self {
        self.response_actions.push(action);
        self
    }

    /// Override the paginator
    #[must_use]
    pub fn with_paginator(mut self, paginator: PaginatorConfig) -> Self {
        self.paginator = Some(paginator);
        self
    }

    /// Set the record selector
    #[must_use]
    pub fn with_data_selector(mut self, selector: impl Into<String>) -> Self {
        self.data_selector = Some(selector.into());
        self
    }

    /// Response policy built from the rules
    pub fn policy(&self) -> Result<ResponsePolicy> {
        ResponsePolicy::new(self.response_actions.clone())
    }

    /// Names of the upstream resources
    pub fn upstreams(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for rule in &self.resolve {
            if !names.contains(&rule.resource.as_str()) {
                names.push(&rule.resource);
            }
        }
        names
    }
}

/// A validated pipeline, ready to run
#[derive(Debug, Clone)]
pub struct Source {
    /// Pipeline name
    pub name: String,
    /// Client settings
    pub client: ClientSpec,
    /// Resources in declaration order
    pub resources: Vec<ResourceSpec>,
    /// Dependency graph of the resources
    pub graph: DependencyGraph,
}

impl Source {
    /// Look up a resource by name
    pub fn resource(&self, name: &str) -> Option<&ResourceSpec> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Resources in fetch order
    pub fn ordered(&self) -> Vec<&ResourceSpec> {
        self.graph
            .fetch_order()
            .into_iter()
            .filter_map(|name| self.resource(name))
            .collect()
    }
}
