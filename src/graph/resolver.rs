//! Parameter resolution from upstream records

use super::types::ResolveRule;
use crate::types::{lookup_path, scalar_to_string, JsonObject};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// One concrete parameter set for a dependent resource's request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParams {
    /// Placeholder → value, in rule order
    pub values: Vec<(String, String)>,
    /// Upstream resource → the first record that supplied the value
    pub parents: Vec<(String, Value)>,
}

impl ResolvedParams {
    /// Value resolved for `param`
    pub fn get(&self, param: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == param)
            .map(|(_, v)| v.as_str())
    }

    /// Resolved values as a lookup map (for path filling)
    pub fn as_map(&self) -> HashMap<String, String> {
        self.values.iter().cloned().collect()
    }

    /// Copy `fields` of the parent records as `_<parent>_<field>` columns
    pub fn parent_columns(&self, fields: &[String]) -> JsonObject {
        let mut columns = JsonObject::new();
        for (parent, record) in &self.parents {
            for field in fields {
                if let Some(value) = lookup_path(record, field) {
                    let column = format!("_{parent}_{}", field.replace('.', "_"));
                    columns.insert(column, value.clone());
                }
            }
        }
        columns
    }

    /// Short label for logs (`berry_name=cheri`)
    pub fn label(&self) -> String {
        self.values
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Produces the parameter sets of a dependent resource
#[derive(Debug, Clone, Copy, Default)]
pub struct ParamResolver;

impl ParamResolver {
    /// One parameter set per distinct combination of resolved values.
    ///
    /// Values are distinct per rule and kept in first-seen order; several
    /// rules produce their cross product. Records without the field are
    /// skipped. A rule with no values yields no parameter sets at all, and
    /// no rules yield exactly one empty set.
    pub fn resolve(
        rules: &[ResolveRule],
        upstream: &HashMap<String, Vec<Value>>,
    ) -> Vec<ResolvedParams> {
        let mut combos = vec![ResolvedParams::default()];

        for rule in rules {
            let candidates = Self::distinct_values(rule, upstream);
            if candidates.is_empty() {
                return Vec::new();
            }

            let mut next = Vec::with_capacity(combos.len() * candidates.len());
            for combo in &combos {
                for (value, record) in &candidates {
                    let mut params = combo.clone();
                    params.values.push((rule.param.clone(), value.clone()));
                    if !params.parents.iter().any(|(name, _)| *name == rule.resource) {
                        params.parents.push((rule.resource.clone(), (*record).clone()));
                    }
                    next.push(params);
                }
            }
            combos = next;
        }

        combos
    }

    /// Distinct values of `rule.field`, with the first record carrying each
    fn distinct_values<'a>(
        rule: &ResolveRule,
        upstream: &'a HashMap<String, Vec<Value>>,
    ) -> Vec<(String, &'a Value)> {
        let Some(records) = upstream.get(&rule.resource) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut values = Vec::new();
        let mut missing = 0usize;

        for record in records {
            match lookup_path(record, &rule.field).and_then(scalar_to_string) {
                Some(value) => {
                    if seen.insert(value.clone()) {
                        values.push((value, record));
                    }
                }
                None => missing += 1,
            }
        }

        if missing > 0 {
            debug!(
                resource = %rule.resource,
                field = %rule.field,
                missing,
                "Skipped upstream records without a usable value"
            );
        }

        values
    }
}
