//! Dependency graph types

use crate::error::{Error, Result};
use crate::loader::ResourceSpec;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

/// A path placeholder whose values come from another resource's records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRule {
    /// Placeholder in the dependent's path
    pub param: String,
    /// Upstream resource name
    pub resource: String,
    /// Dotted path into upstream records
    pub field: String,
}

impl ResolveRule {
    /// Create a resolve rule
    pub fn new(
        param: impl Into<String>,
        resource: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            param: param.into(),
            resource: resource.into(),
            field: field.into(),
        }
    }
}

/// Directed acyclic graph of resource dependencies
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Resource names in declaration order
    names: Vec<String>,
    /// Name → declaration index
    index: HashMap<String, usize>,
    /// Upstreams of each resource
    upstream: Vec<BTreeSet<usize>>,
    /// Dependents of each resource
    downstream: Vec<BTreeSet<usize>>,
    /// Topological order
    order: Vec<usize>,
}

impl DependencyGraph {
    /// Build the graph from resource specs
    pub fn build(resources: &[ResourceSpec]) -> Result<Self> {
        Self::from_edges(resources.iter().map(|spec| {
            (
                spec.name.clone(),
                spec.resolve.iter().map(|rule| rule.resource.clone()).collect(),
            )
        }))
    }

    /// Build the graph from `(resource, upstream names)` pairs in declaration
    /// order.
    pub fn from_edges<I>(edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let edges: Vec<(String, Vec<String>)> = edges.into_iter().collect();

        let mut index = HashMap::with_capacity(edges.len());
        for (i, (name, _)) in edges.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(Error::config(format!("duplicate resource name '{name}'")));
            }
        }

        let mut upstream = vec![BTreeSet::new(); edges.len()];
        let mut downstream = vec![BTreeSet::new(); edges.len()];
        for (i, (name, deps)) in edges.iter().enumerate() {
            for dep in deps {
                let j = *index.get(dep).ok_or_else(|| Error::UnknownResource {
                    resource: name.clone(),
                    target: dep.clone(),
                })?;
                upstream[i].insert(j);
                downstream[j].insert(i);
            }
        }

        let mut graph = Self {
            names: edges.into_iter().map(|(name, _)| name).collect(),
            index,
            upstream,
            downstream,
            order: Vec::new(),
        };
        graph.order = graph.topological_order()?;
        Ok(graph)
    }

    /// Kahn's algorithm, always releasing the earliest declared ready node
    fn topological_order(&self) -> Result<Vec<usize>> {
        let mut remaining: Vec<usize> = self.upstream.iter().map(BTreeSet::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = remaining
            .iter()
            .enumerate()
            .filter(|(_, &n)| n == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(self.names.len());
        while let Some(Reverse(i)) = ready.pop() {
            order.push(i);
            for &d in &self.downstream[i] {
                remaining[d] -= 1;
                if remaining[d] == 0 {
                    ready.push(Reverse(d));
                }
            }
        }

        if order.len() == self.names.len() {
            Ok(order)
        } else {
            Err(Error::CyclicDependency {
                cycle: self.find_cycle(&remaining),
            })
        }
    }

    /// Walk upstream edges from an unreleased node until one repeats
    fn find_cycle(&self, remaining: &[usize]) -> Vec<String> {
        let Some(start) = remaining.iter().position(|&n| n > 0) else {
            return Vec::new();
        };

        let mut path = vec![start];
        let mut current = start;
        loop {
            let Some(&next) = self.upstream[current]
                .iter()
                .find(|&&u| remaining[u] > 0)
            else {
                break;
            };
            if let Some(pos) = path.iter().position(|&p| p == next) {
                // Report in dependency direction: a -> b means a needs b
                let mut cycle: Vec<String> =
                    path[pos..].iter().map(|&i| self.names[i].clone()).collect();
                cycle.push(self.names[next].clone());
                return cycle;
            }
            path.push(next);
            current = next;
        }

        path.iter().map(|&i| self.names[i].clone()).collect()
    }

    /// Number of resources
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the graph has no resources
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether `name` is a resource of this graph
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Resource names in declaration order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Resources in fetch order: every resource after all its upstreams
    pub fn fetch_order(&self) -> Vec<&str> {
        self.order.iter().map(|&i| self.names[i].as_str()).collect()
    }

    /// Direct upstreams of `name`, in declaration order
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.neighbours(name, &self.upstream)
    }

    /// Direct dependents of `name`, in declaration order
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.neighbours(name, &self.downstream)
    }

    fn neighbours<'a>(&'a self, name: &str, edges: &'a [BTreeSet<usize>]) -> Vec<&'a str> {
        self.index
            .get(name)
            .map(|&i| edges[i].iter().map(|&j| self.names[j].as_str()).collect())
            .unwrap_or_default()
    }

    /// Number of distinct upstreams per resource
    pub fn dependency_counts(&self) -> HashMap<String, usize> {
        self.names
            .iter()
            .zip(&self.upstream)
            .map(|(name, deps)| (name.clone(), deps.len()))
            .collect()
    }

    /// `selected` plus everything they transitively depend on, in
    /// declaration order
    pub fn with_upstreams(&self, selected: &[String]) -> Result<Vec<String>> {
        let mut keep = vec![false; self.names.len()];
        let mut stack = Vec::new();
        for name in selected {
            let &i = self
                .index
                .get(name)
                .ok_or_else(|| Error::config(format!("unknown resource '{name}'")))?;
            stack.push(i);
        }

        while let Some(i) = stack.pop() {
            if !keep[i] {
                keep[i] = true;
                stack.extend(self.upstream[i].iter().copied());
            }
        }

        Ok(self
            .names
            .iter()
            .zip(keep)
            .filter(|(_, k)| *k)
            .map(|(name, _)| name.clone())
            .collect())
    }
}
