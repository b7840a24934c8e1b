//! YAML parser for pipeline definitions
//!
//! Parses, interpolates, merges defaults, and validates pipeline YAML.
//! Supports both built-in pipelines (by name) and custom YAML files (by path).
//! Every configuration error surfaces here, before any request is made.

use crate::error::{Error, Result};
use crate::graph::{DependencyGraph, ResolveRule};
use crate::incremental::IncrementalSpec;
use crate::loader::types::{
    ClientDefinition, ClientSpec, DynamicParam, ParamDefinition, PipelineDefinition,
    ResourceDefaults, ResourceDefinition, ResourceSpec, Source,
};
use crate::pipelines;
use crate::policy::ResponsePolicy;
use crate::template::{placeholders, render_value, TemplateContext};
use crate::types::{scalar_to_string, WriteDisposition};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Load a pipeline from a built-in name or a file path
///
/// `secrets` fills `{{ config.* }}` templates. Without it templates are left
/// as written, which is enough to validate structure and plan the run.
///
/// # Examples
///
/// ```ignore
/// let source = load_pipeline("pokemon", None)?;
/// let source = load_pipeline("./zoom.yaml", Some(&secrets))?;
/// ```
pub fn load_pipeline(path: impl AsRef<Path>, secrets: Option<&Value>) -> Result<Source> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();

    // A bare name (no separators, no extension) may be a built-in pipeline
    if !path_str.contains('/')
        && !path_str.contains('\\')
        && !path_str.ends_with(".yaml")
        && !path_str.ends_with(".yml")
    {
        if let Some(yaml) = pipelines::get_builtin(&path_str) {
            return load_pipeline_from_str(yaml, secrets);
        }
    }

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::config(format!(
                "Pipeline '{}' not found. Built-in pipelines: {}. Or provide a path to a YAML file.",
                path.display(),
                pipelines::list_builtin().join(", ")
            ))
        } else {
            Error::config(format!(
                "Failed to read pipeline file '{}': {e}",
                path.display()
            ))
        }
    })?;
    load_pipeline_from_str(&content, secrets)
}

/// Load a pipeline from a YAML string
pub fn load_pipeline_from_str(yaml: &str, secrets: Option<&Value>) -> Result<Source> {
    build_source(parse_definition(yaml, secrets)?)
}

/// Parse YAML into a definition, interpolating secrets first
pub fn parse_definition(yaml: &str, secrets: Option<&Value>) -> Result<PipelineDefinition> {
    let raw: Value = serde_yaml::from_str(yaml)?;

    let raw = match secrets {
        Some(secrets) => render_value(&raw, &TemplateContext::with_config(secrets.clone()))?,
        None => raw,
    };

    serde_json::from_value(raw)
        .map_err(|e| Error::config(format!("Invalid pipeline definition: {e}")))
}

/// Validate a definition and turn it into a runnable source
pub fn build_source(def: PipelineDefinition) -> Result<Source> {
    let PipelineDefinition {
        name,
        client,
        resource_defaults,
        resources,
    } = def;

    let client = build_client(client)?;

    if resources.is_empty() {
        return Err(Error::config("Pipeline must have at least one resource"));
    }

    let mut names = HashSet::new();
    for entry in &resources {
        if !names.insert(entry.name()) {
            return Err(Error::config(format!(
                "Duplicate resource name '{}'",
                entry.name()
            )));
        }
    }

    let resources = resources
        .into_iter()
        .map(|entry| build_resource(entry.into_definition(), &resource_defaults))
        .collect::<Result<Vec<_>>>()?;

    let graph = DependencyGraph::build(&resources)?;
    debug!(resources = resources.len(), "Validated pipeline");

    Ok(Source {
        name: name.unwrap_or_else(|| "restload".to_string()),
        client,
        resources,
        graph,
    })
}

fn build_client(client: ClientDefinition) -> Result<ClientSpec> {
    if client.base_url.trim().is_empty() {
        return Err(Error::missing_field("client.base_url"));
    }
    if client.http.timeout_secs == 0 {
        return Err(Error::invalid_value(
            "client.http.timeout_secs",
            "must be greater than zero",
        ));
    }
    if client.http.rate_limit_rps == Some(0) {
        return Err(Error::invalid_value(
            "client.http.rate_limit_rps",
            "must be greater than zero",
        ));
    }

    Ok(ClientSpec {
        base_url: client.base_url,
        auth: client.auth.map(|a| a.into_config()).unwrap_or_default(),
        paginator: client.paginator.unwrap_or_default(),
        headers: client.headers,
        http: client.http,
    })
}

fn build_resource(def: ResourceDefinition, defaults: &ResourceDefaults) -> Result<ResourceSpec> {
    let ResourceDefinition {
        name,
        endpoint,
        write_disposition,
        primary_key,
        include_from_parent,
        selected,
    } = def;

    if name.trim().is_empty() {
        return Err(Error::config("Resource name cannot be empty"));
    }

    let path = endpoint.path.unwrap_or_else(|| name.clone());
    let path_placeholders = placeholders(&path);

    // Resource params win over defaults, key by key
    let mut params = defaults.endpoint.params.clone();
    params.extend(endpoint.params);
    let mut headers = defaults.endpoint.headers.clone();
    headers.extend(endpoint.headers);

    let mut query = Vec::new();
    let mut path_params = BTreeMap::new();
    let mut resolve = Vec::new();
    let mut incremental: Option<IncrementalSpec> = None;

    for (key, param) in params {
        match param {
            ParamDefinition::Dynamic(DynamicParam::Resolve { resource, field }) => {
                if !path_placeholders.contains(&key) {
                    return Err(Error::invalid_value(
                        format!("{name}.endpoint.params.{key}"),
                        format!("resolve param is not used in path '{path}'"),
                    ));
                }
                resolve.push(ResolveRule::new(key, resource, field));
            }
            ParamDefinition::Dynamic(DynamicParam::Incremental {
                cursor_path,
                initial_value,
                last_value_func,
            }) => {
                if let Some(existing) = &incremental {
                    return Err(Error::invalid_value(
                        format!("{name}.endpoint.params.{key}"),
                        format!("only one incremental param allowed, '{}' already is", existing.param),
                    ));
                }
                if matches!(initial_value, Some(Value::Array(_) | Value::Object(_))) {
                    return Err(Error::invalid_value(
                        format!("{name}.endpoint.params.{key}.initial_value"),
                        "must be a scalar",
                    ));
                }
                let mut spec = IncrementalSpec::new(&key, cursor_path)
                    .with_last_value_func(last_value_func);
                spec.initial_value = initial_value.filter(|v| !v.is_null());
                incremental = Some(spec);
            }
            ParamDefinition::Static(Value::Null) => {}
            ParamDefinition::Static(value) => {
                let text = scalar_to_string(&value).ok_or_else(|| {
                    Error::invalid_value(
                        format!("{name}.endpoint.params.{key}"),
                        "static params must be strings, numbers, or booleans",
                    )
                })?;
                if path_placeholders.contains(&key) {
                    path_params.insert(key, text);
                } else {
                    query.push((key, text));
                }
            }
        }
    }

    let unfilled: Vec<&String> = path_placeholders
        .iter()
        .filter(|p| !path_params.contains_key(*p) && !resolve.iter().any(|r| &r.param == *p))
        .collect();
    if let Some(placeholder) = unfilled.first() {
        return Err(Error::invalid_value(
            format!("{name}.endpoint.path"),
            format!("placeholder {{{placeholder}}} in '{path}' has no value"),
        ));
    }

    let write_disposition = write_disposition
        .or(defaults.write_disposition)
        .unwrap_or_default();
    let primary_key = primary_key
        .or_else(|| defaults.primary_key.clone())
        .map(|pk| pk.columns())
        .unwrap_or_default();

    if primary_key.iter().any(|c| c.trim().is_empty()) {
        return Err(Error::invalid_value(
            format!("{name}.primary_key"),
            "column names cannot be empty",
        ));
    }
    if write_disposition == WriteDisposition::Merge && primary_key.is_empty() {
        return Err(Error::invalid_value(
            format!("{name}.primary_key"),
            "merge write disposition requires a primary key",
        ));
    }
    if !include_from_parent.is_empty() && resolve.is_empty() {
        return Err(Error::invalid_value(
            format!("{name}.include_from_parent"),
            "resource has no parent to include fields from",
        ));
    }

    let response_actions = endpoint
        .response_actions
        .or_else(|| defaults.endpoint.response_actions.clone())
        .unwrap_or_default();
    ResponsePolicy::new(response_actions.clone()).map_err(|e| {
        Error::invalid_value(format!("{name}.endpoint.response_actions"), e.to_string())
    })?;

    Ok(ResourceSpec {
        path,
        method: endpoint
            .method
            .or(defaults.endpoint.method)
            .unwrap_or_default(),
        params: query,
        path_params,
        headers,
        write_disposition,
        primary_key,
        incremental,
        resolve,
        response_actions,
        paginator: endpoint
            .paginator
            .or_else(|| defaults.endpoint.paginator.clone()),
        data_selector: endpoint
            .data_selector
            .or_else(|| defaults.endpoint.data_selector.clone()),
        include_from_parent,
        selected: selected.unwrap_or(true),
        name,
    })
}
