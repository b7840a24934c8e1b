//! DuckDB destination integration tests
//!
//! Runs pipelines against a mock API into a DuckDB file in a temp directory.

use restload::loader::load_pipeline_from_str;
use restload::{
    AuthProvider, DuckDbSink, Pipeline, ResourceStatus, RunContext, RunSummary, Sink,
    StateManager,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, ResponseTemplate};

const PIPELINE: &str = r#"
name: shop
client:
  base_url: "{{ config.base_url }}"
  paginator: { type: single }
  http: { max_retries: 0 }
resources:
  - name: orders
    write_disposition: merge
    primary_key: id
  - name: products
    write_disposition: replace
  - name: events
"#;

async fn run_into(server: &MockServer, db: &Path, state: &StateManager) -> RunSummary {
    let source =
        load_pipeline_from_str(PIPELINE, Some(&json!({"base_url": server.uri()}))).unwrap();
    let sink: Arc<dyn Sink> = Arc::new(DuckDbSink::open(db, "shop").unwrap());
    let auth = Arc::new(AuthProvider::new(source.client.auth.clone()).unwrap());
    Pipeline::new(source, sink)
        .unwrap()
        .run(&RunContext::new(auth, state.clone()))
        .await
        .unwrap()
}

async fn mount_page(server: &MockServer, resource: &str, body: serde_json::Value) {
    Mock::given(path(format!("/{resource}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_dispositions_across_runs() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("shop.duckdb");
    let state = StateManager::in_memory();
    let server = MockServer::start().await;

    mount_page(&server, "orders", json!([{"id": 1, "total": 10}, {"id": 2, "total": 20}])).await;
    mount_page(&server, "products", json!([{"sku": "a"}, {"sku": "b"}])).await;
    mount_page(&server, "events", json!([{"kind": "created"}])).await;

    let first = run_into(&server, &db, &state).await;
    assert_eq!(first.count(ResourceStatus::Done), 3);

    mount_page(&server, "orders", json!([{"id": 1, "total": 15}, {"id": 3, "total": 30}])).await;
    mount_page(&server, "products", json!([{"sku": "c"}])).await;
    mount_page(&server, "events", json!([{"kind": "updated"}])).await;

    let second = run_into(&server, &db, &state).await;
    assert!(!second.has_failures());

    let sink = DuckDbSink::open(&db, "shop").unwrap();

    let mut orders = sink.records("orders").unwrap();
    orders.sort_by_key(|r| r["id"].as_i64().unwrap_or_default());
    assert_eq!(
        orders,
        vec![
            json!({"id": 1, "total": 15}),
            json!({"id": 2, "total": 20}),
            json!({"id": 3, "total": 30}),
        ]
    );

    assert_eq!(sink.records("products").unwrap(), vec![json!({"sku": "c"})]);
    assert_eq!(sink.row_count("events").unwrap(), 2);
}

#[tokio::test]
async fn test_failed_resource_leaves_table_untouched() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("shop.duckdb");
    let state = StateManager::in_memory();
    let server = MockServer::start().await;

    mount_page(&server, "orders", json!([{"id": 1, "total": 10}])).await;
    mount_page(&server, "products", json!([{"sku": "a"}])).await;
    mount_page(&server, "events", json!([])).await;
    run_into(&server, &db, &state).await;

    Mock::given(path("/products"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_page(&server, "orders", json!([])).await;
    mount_page(&server, "events", json!([])).await;

    let summary = run_into(&server, &db, &state).await;
    assert_eq!(
        summary.outcome("products").unwrap().status,
        ResourceStatus::Failed
    );

    let sink = DuckDbSink::open(&db, "shop").unwrap();
    assert_eq!(sink.records("products").unwrap(), vec![json!({"sku": "a"})]);
}
