//! # restload
//!
//! A declarative engine that pulls records from paginated REST APIs and loads
//! them incrementally into a destination.
//!
//! ## Features
//!
//! - **YAML pipelines**: client, auth, paginator, and resources in one file
//! - **Dependent resources**: one request per parent value, `{placeholder}` paths
//! - **Incremental loading**: cursor watermarks committed only after the sink commits
//! - **Write dispositions**: append, replace, merge on a primary key
//! - **Bounded concurrency**: independent resources fetched in parallel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use restload::{load_pipeline, AuthProvider, MemorySink, Pipeline, RunContext, StateManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> restload::Result<()> {
//!     let source = load_pipeline("pokemon", None)?;
//!     let auth = Arc::new(AuthProvider::new(source.client.auth.clone())?);
//!     let pipeline = Pipeline::new(source, Arc::new(MemorySink::new()))?;
//!
//!     let summary = pipeline
//!         .run(&RunContext::new(auth, StateManager::in_memory()))
//!         .await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  loader: YAML + secrets → Source (ResourceSpecs + graph)      │
//! └───────────────────────────────────────────────────────────────┘
//!                               │
//! ┌───────────────────────────────────────────────────────────────┐
//! │  engine: dependency-ordered scheduling on a bounded pool       │
//! └───────────────────────────────────────────────────────────────┘
//!                               │
//! ┌──────────┬───────────┬──────┴──────┬─────────────┬────────────┐
//! │   Auth   │   HTTP    │  Paginate   │ Incremental │    Sink    │
//! ├──────────┼───────────┼─────────────┼─────────────┼────────────┤
//! │ API Key  │ Retry     │ JSON cursor │ Watermark   │ DuckDB     │
//! │ Basic    │ Backoff   │ Offset/Page │ Merge keys  │ Memory     │
//! │ OAuth2   │ Rate Limit│ Link / Next │ State file  │            │
//! └──────────┴───────────┴─────────────┴─────────────┴────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and helpers
pub mod types;

/// `{{ config.x }}` and `{placeholder}` templates
pub mod template;

/// Authentication strategies and credential provider
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Pagination strategies
pub mod pagination;

/// Record extraction from response bodies
pub mod decode;

/// Response classification rules
pub mod policy;

/// Resource dependency graph and parameter resolution
pub mod graph;

/// Cursor tracking for incremental loads
pub mod incremental;

/// Persisted cursor state
pub mod state;

/// Record destinations
pub mod sink;

/// YAML loader for pipeline definitions
pub mod loader;

/// Built-in pipeline definitions
pub mod pipelines;

/// Execution engine
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

pub use auth::{AuthConfig, AuthProvider};
pub use engine::{Pipeline, ResourceOutcome, ResourceStatus, RunConfig, RunContext, RunSummary};
pub use loader::{load_pipeline, load_pipeline_from_str, ResourceSpec, Source};
pub use sink::{DuckDbSink, MemorySink, Sink};
pub use state::StateManager;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
