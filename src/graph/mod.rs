//! Resource dependency graph
//!
//! # Overview
//!
//! A resource whose path placeholders resolve from another resource's records
//! depends on that resource. The graph orders resources so every one is
//! fetched after its upstreams (ties broken by declaration order), rejects
//! cycles at load time, and supplies the scheduler with per-resource
//! dependency counts. The resolver turns upstream records into the concrete
//! parameter sets of the dependent's requests.

mod resolver;
mod types;

pub use resolver::{ParamResolver, ResolvedParams};
pub use types::{DependencyGraph, ResolveRule};

#[cfg(test)]
mod tests;
