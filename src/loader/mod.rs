//! YAML Loader module
//!
//! Parse pipeline definitions from YAML files.
//!
//! # Overview
//!
//! The loader module provides:
//! - `PipelineDefinition` - The YAML surface (client, resource defaults, resources)
//! - `Source` / `ResourceSpec` - The validated, defaults-merged form the engine runs
//! - Secret interpolation and load-time validation

mod parser;
mod types;

pub use parser::{build_source, load_pipeline, load_pipeline_from_str, parse_definition};
pub use types::{
    AuthDefinition, ClientDefinition, ClientSpec, DynamicParam, EndpointDefinition,
    HttpDefinition, ParamDefinition, PipelineDefinition, PrimaryKey, ResourceDefaults,
    ResourceDefinition, ResourceEntry, ResourceSpec, Source,
};
