//! Tests for graph module

use super::*;
use crate::error::Error;
use serde_json::{json, Value};
use std::collections::HashMap;
use test_case::test_case;

fn graph(edges: &[(&str, &[&str])]) -> crate::error::Result<DependencyGraph> {
    DependencyGraph::from_edges(edges.iter().map(|(name, deps)| {
        (
            (*name).to_string(),
            deps.iter().map(|d| (*d).to_string()).collect(),
        )
    }))
}

fn position(order: &[&str], name: &str) -> usize {
    order.iter().position(|n| *n == name).unwrap()
}

// ============================================================================
// Ordering Tests
// ============================================================================

#[test]
fn test_fetch_order_keeps_declaration_order_without_edges() {
    let g = graph(&[("berry", &[]), ("pokemon", &[]), ("items", &[])]).unwrap();
    assert_eq!(g.fetch_order(), vec!["berry", "pokemon", "items"]);
}

#[test]
fn test_fetch_order_puts_upstream_first() {
    // Dependent declared before its upstream
    let g = graph(&[("berry_details", &["berry"]), ("pokemon", &[]), ("berry", &[])]).unwrap();
    assert_eq!(g.fetch_order(), vec!["pokemon", "berry", "berry_details"]);
}

#[test]
fn test_fetch_order_zoom_shape() {
    let g = graph(&[
        ("users", &[]),
        ("meetings", &["users"]),
        ("meeting_polls", &["meetings"]),
        ("webinars", &["users"]),
        ("webinar_panelists", &["webinars"]),
        ("meetings_report", &["users"]),
    ])
    .unwrap();

    let order = g.fetch_order();
    assert_eq!(order.len(), 6);
    for name in g.names() {
        for dep in g.dependencies(name) {
            assert!(position(&order, dep) < position(&order, name), "{dep} before {name}");
        }
    }
    assert_eq!(order[0], "users");
    assert_eq!(order[1], "meetings");
}

#[test]
fn test_diamond_dependencies() {
    let g = graph(&[
        ("d", &["b", "c"]),
        ("c", &["a"]),
        ("b", &["a"]),
        ("a", &[]),
    ])
    .unwrap();
    assert_eq!(g.fetch_order(), vec!["a", "c", "b", "d"]);
    assert_eq!(g.dependency_counts()["d"], 2);
    assert_eq!(g.dependents("a"), vec!["c", "b"]);
}

#[test]
fn test_duplicate_edge_counts_once() {
    let g = graph(&[("a", &[]), ("b", &["a", "a"])]).unwrap();
    assert_eq!(g.dependency_counts()["b"], 1);
    assert_eq!(g.dependencies("b"), vec!["a"]);
}

// ============================================================================
// Error Tests
// ============================================================================

#[test_case(&[("a", &["a"])] ; "self reference")]
#[test_case(&[("a", &["b"]), ("b", &["a"])] ; "two node cycle")]
#[test_case(&[("x", &[]), ("a", &["c"]), ("b", &["a"]), ("c", &["b"])] ; "three node cycle")]
fn test_cycle_is_rejected(edges: &[(&str, &[&str])]) {
    let err = graph(edges).unwrap_err();
    match err {
        Error::CyclicDependency { cycle } => {
            assert!(cycle.len() >= 2);
            assert_eq!(cycle.first(), cycle.last());
            assert!(!cycle.contains(&"x".to_string()));
        }
        other => panic!("Expected CyclicDependency, got {other:?}"),
    }
    assert!(graph(edges).unwrap_err().is_config());
}

#[test]
fn test_unknown_resource() {
    let err = graph(&[("berry_details", &["berries"])]).unwrap_err();
    assert!(matches!(
        err,
        Error::UnknownResource { ref resource, ref target }
            if resource == "berry_details" && target == "berries"
    ));
}

#[test]
fn test_duplicate_name() {
    let err = graph(&[("berry", &[]), ("berry", &[])]).unwrap_err();
    assert!(err.to_string().contains("duplicate resource name 'berry'"));
}

#[test]
fn test_with_upstreams() {
    let g = graph(&[
        ("users", &[]),
        ("meetings", &["users"]),
        ("meeting_polls", &["meetings"]),
        ("webinars", &["users"]),
        ("pokemon", &[]),
    ])
    .unwrap();

    let selected = g.with_upstreams(&["meeting_polls".to_string()]).unwrap();
    assert_eq!(selected, vec!["users", "meetings", "meeting_polls"]);

    assert!(g.with_upstreams(&["nope".to_string()]).is_err());
}

// ============================================================================
// Resolver Tests
// ============================================================================

fn upstream(name: &str, records: Vec<Value>) -> HashMap<String, Vec<Value>> {
    HashMap::from([(name.to_string(), records)])
}

#[test]
fn test_resolve_one_set_per_distinct_value() {
    let rules = vec![ResolveRule::new("berry_name", "berry", "name")];
    let records = upstream(
        "berry",
        vec![
            json!({"name": "chesto"}),
            json!({"name": "cheri"}),
            json!({"name": "chesto"}),
            json!({"url": "no name"}),
        ],
    );

    let sets = ParamResolver::resolve(&rules, &records);
    let values: Vec<_> = sets.iter().map(|s| s.get("berry_name").unwrap()).collect();
    assert_eq!(values, vec!["chesto", "cheri"]);
    assert_eq!(sets[0].label(), "berry_name=chesto");
}

#[test]
fn test_resolve_numeric_and_nested_fields() {
    let rules = vec![ResolveRule::new("meeting_id", "meetings", "meta.id")];
    let records = upstream("meetings", vec![json!({"meta": {"id": 8_123_456_789_u64}})]);

    let sets = ParamResolver::resolve(&rules, &records);
    assert_eq!(sets[0].get("meeting_id"), Some("8123456789"));
}

#[test]
fn test_resolve_cross_product() {
    let rules = vec![
        ResolveRule::new("owner", "repos", "owner"),
        ResolveRule::new("state", "states", "name"),
    ];
    let mut records = upstream("repos", vec![json!({"owner": "a"}), json!({"owner": "b"})]);
    records.insert(
        "states".to_string(),
        vec![json!({"name": "open"}), json!({"name": "closed"})],
    );

    let sets = ParamResolver::resolve(&rules, &records);
    let labels: Vec<_> = sets.iter().map(ResolvedParams::label).collect();
    assert_eq!(
        labels,
        vec![
            "owner=a,state=open",
            "owner=a,state=closed",
            "owner=b,state=open",
            "owner=b,state=closed"
        ]
    );
}

#[test]
fn test_resolve_zero_upstream_records() {
    let rules = vec![ResolveRule::new("berry_name", "berry", "name")];
    assert!(ParamResolver::resolve(&rules, &upstream("berry", vec![])).is_empty());
    assert!(ParamResolver::resolve(&rules, &HashMap::new()).is_empty());
}

#[test]
fn test_resolve_without_rules() {
    let sets = ParamResolver::resolve(&[], &HashMap::new());
    assert_eq!(sets, vec![ResolvedParams::default()]);
}

#[test]
fn test_parent_columns() {
    let rules = vec![ResolveRule::new("berry_name", "berry", "name")];
    let records = upstream(
        "berry",
        vec![json!({"name": "cheri", "url": "https://pokeapi.co/api/v2/berry/1/"})],
    );

    let sets = ParamResolver::resolve(&rules, &records);
    let columns = sets[0].parent_columns(&["name".to_string(), "missing".to_string()]);
    assert_eq!(columns.len(), 1);
    assert_eq!(columns["_berry_name"], json!("cheri"));
}
