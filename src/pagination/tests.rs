//! Tests for pagination module

use super::*;
use crate::http::{HttpRequest, HttpResponse};
use serde_json::{json, Value};

fn page(body: &Value) -> (HttpResponse, Value) {
    (HttpResponse::new(200, body.to_string()), body.clone())
}

fn advance(
    paginator: &dyn Paginator,
    previous: &HttpRequest,
    response: &HttpResponse,
    body: &Value,
    records: usize,
) -> Option<HttpRequest> {
    paginator.advance(previous, &PageResponse::new(response, body), records)
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_default_is_auto() {
    assert_eq!(PaginatorConfig::default(), PaginatorConfig::Auto);
}

#[test]
fn test_config_from_yaml() {
    let config: PaginatorConfig = serde_yaml::from_str(
        "type: json_cursor\ncursor_path: response.next_page_token\ncursor_param: page_number",
    )
    .unwrap();
    assert_eq!(
        config,
        PaginatorConfig::json_cursor("response.next_page_token", "page_number")
    );

    let config: PaginatorConfig = serde_yaml::from_str("type: offset\nlimit: 50").unwrap();
    assert_eq!(config, PaginatorConfig::offset(50));

    let config: PaginatorConfig = serde_yaml::from_str("type: header_link").unwrap();
    assert_eq!(config, PaginatorConfig::link_header());

    let config: PaginatorConfig = serde_yaml::from_str("type: single_page").unwrap();
    assert_eq!(config.kind(), "single");
}

#[test]
fn test_config_page_number_defaults() {
    let config: PaginatorConfig = serde_yaml::from_str("type: page_number").unwrap();
    assert_eq!(config, PaginatorConfig::page_number("page", 1));
}

// ============================================================================
// JSON Cursor Tests
// ============================================================================

#[test]
fn test_json_cursor_sets_param() {
    let paginator = PaginatorConfig::json_cursor("response.next_page_token", "page_number").build();
    let first = HttpRequest::get("https://api.zoom.us/v2/users").query("page_size", "300");
    let (response, body) = page(&json!({"response": {"next_page_token": "tok2"}, "users": [1]}));

    let next = advance(paginator.as_ref(), &first, &response, &body, 1).unwrap();
    assert_eq!(next.query_value("page_number"), Some("tok2"));
    assert_eq!(next.query_value("page_size"), Some("300"));
    assert_eq!(next.url, first.url);
}

#[test]
fn test_json_cursor_exhausted_when_absent() {
    let paginator = PaginatorConfig::json_cursor("response.next_page_token", "page_number").build();
    let request = HttpRequest::get("https://api.zoom.us/v2/users").query("page_number", "tok2");

    for body in [
        json!({"users": [1, 2]}),
        json!({"response": {"next_page_token": null}}),
        json!({"response": {"next_page_token": ""}}),
        json!({"response": {"next_page_token": {"nested": true}}}),
    ] {
        let (response, body) = page(&body);
        assert!(advance(paginator.as_ref(), &request, &response, &body, 2).is_none());
    }
}

#[test]
fn test_json_cursor_stop_value() {
    let paginator = PaginatorConfig::JsonCursor {
        cursor_path: "meta.next".into(),
        cursor_param: "cursor".into(),
        stop_value: Some(json!("END")),
    }
    .build();
    let request = HttpRequest::get("https://api.example.com/items");

    let (response, body) = page(&json!({"meta": {"next": "END"}}));
    assert!(advance(paginator.as_ref(), &request, &response, &body, 5).is_none());

    let (response, body) = page(&json!({"meta": {"next": 42}}));
    let next = advance(paginator.as_ref(), &request, &response, &body, 5).unwrap();
    assert_eq!(next.query_value("cursor"), Some("42"));
}

// ============================================================================
// Offset Tests
// ============================================================================

#[test]
fn test_offset_prepare_and_advance() {
    let paginator = PaginatorConfig::offset(2).build();
    let mut request = HttpRequest::get("https://api.example.com/items");
    paginator.prepare(&mut request);
    assert_eq!(request.query_value("offset"), Some("0"));
    assert_eq!(request.query_value("limit"), Some("2"));

    let (response, body) = page(&json!([{"id": 1}, {"id": 2}]));
    let next = advance(paginator.as_ref(), &request, &response, &body, 2).unwrap();
    assert_eq!(next.query_value("offset"), Some("2"));

    let next = advance(paginator.as_ref(), &next, &response, &body, 2).unwrap();
    assert_eq!(next.query_value("offset"), Some("4"));
}

#[test]
fn test_offset_stops_on_short_page() {
    let paginator = PaginatorConfig::offset(10).build();
    let request = HttpRequest::get("https://api.example.com/items").query("offset", "10");
    let (response, body) = page(&json!([{"id": 1}]));
    assert!(advance(paginator.as_ref(), &request, &response, &body, 1).is_none());
}

#[test]
fn test_offset_stops_at_total() {
    let paginator = PaginatorConfig::Offset {
        offset_param: "offset".into(),
        limit_param: "limit".into(),
        limit: 2,
        total_path: Some("count".into()),
    }
    .build();
    let request = HttpRequest::get("https://api.example.com/items").query("offset", "2");

    let (response, body) = page(&json!({"count": 4, "results": [1, 2]}));
    assert!(advance(paginator.as_ref(), &request, &response, &body, 2).is_none());

    let (response, body) = page(&json!({"count": "5", "results": [1, 2]}));
    let next = advance(paginator.as_ref(), &request, &response, &body, 2).unwrap();
    assert_eq!(next.query_value("offset"), Some("4"));
}

// ============================================================================
// Page Number Tests
// ============================================================================

#[test]
fn test_page_number_prepare() {
    let paginator = PageNumberPaginator::new("page", 1).with_page_size("per_page", 100);
    let mut request = HttpRequest::get("https://api.example.com/tickets");
    paginator.prepare(&mut request);
    assert_eq!(request.query_value("page"), Some("1"));
    assert_eq!(request.query_value("per_page"), Some("100"));
}

#[test]
fn test_page_number_advance_and_empty_page() {
    let paginator = PageNumberPaginator::new("page", 1);
    let request = HttpRequest::get("https://api.example.com/tickets").query("page", "3");

    let (response, body) = page(&json!([{"id": 1}]));
    let next = advance(&paginator, &request, &response, &body, 1).unwrap();
    assert_eq!(next.query_value("page"), Some("4"));

    let (response, body) = page(&json!([]));
    assert!(advance(&paginator, &request, &response, &body, 0).is_none());
}

#[test]
fn test_page_number_short_page_and_total_pages() {
    let paginator = PageNumberPaginator::new("page", 0)
        .with_page_size("size", 2)
        .with_total_pages("meta.pages");
    let request = HttpRequest::get("https://api.example.com/items").query("page", "0");

    let (response, body) = page(&json!({"meta": {"pages": 3}}));
    assert!(advance(&paginator, &request, &response, &body, 1).is_none());

    let next = advance(&paginator, &request, &response, &body, 2).unwrap();
    assert_eq!(next.query_value("page"), Some("1"));

    let last = HttpRequest::get("https://api.example.com/items").query("page", "2");
    assert!(advance(&paginator, &last, &response, &body, 2).is_none());
}

// ============================================================================
// Link Header Tests
// ============================================================================

#[test]
fn test_parse_link_header() {
    let header = r#"<https://api.github.com/repos/x/issues?page=2>; rel="next", <https://api.github.com/repos/x/issues?page=5>; rel="last""#;

    assert_eq!(
        parse_link_header(header, "next"),
        Some("https://api.github.com/repos/x/issues?page=2".to_string())
    );
    assert_eq!(
        parse_link_header(header, "last"),
        Some("https://api.github.com/repos/x/issues?page=5".to_string())
    );
    assert_eq!(parse_link_header(header, "prev"), None);
    assert_eq!(
        parse_link_header(r#"<https://x/2>; rel="next last""#, "last"),
        Some("https://x/2".to_string())
    );
}

#[test]
fn test_link_header_follows_next() {
    let paginator = PaginatorConfig::link_header().build();
    let request = HttpRequest::get("https://api.github.com/repos/x/issues")
        .query("since", "2022-01-01T00:00:00Z")
        .header("Authorization", "Bearer t");

    let response = HttpResponse::new(200, "[]").with_header(
        "Link",
        r#"<https://api.github.com/repositories/1/issues?since=2022&page=2>; rel="next""#,
    );
    let body = json!([]);

    let next = advance(paginator.as_ref(), &request, &response, &body, 0).unwrap();
    assert_eq!(
        next.url,
        "https://api.github.com/repositories/1/issues?since=2022&page=2"
    );
    assert!(next.query.is_empty());
    assert_eq!(next.header_value("Authorization"), Some("Bearer t"));

    let (response, body) = page(&json!([]));
    assert!(advance(paginator.as_ref(), &request, &response, &body, 0).is_none());
}

// ============================================================================
// Next URL / Auto Tests
// ============================================================================

#[test]
fn test_next_url_absolute_and_relative() {
    let paginator = PaginatorConfig::next_url("pagination.next").build();
    let request = HttpRequest::get("https://api.example.com/v1/items").query("limit", "10");

    let (response, body) = page(&json!({"pagination": {"next": "/v1/items?cursor=b"}}));
    let next = advance(paginator.as_ref(), &request, &response, &body, 1).unwrap();
    assert_eq!(next.url, "https://api.example.com/v1/items?cursor=b");
    assert!(next.query.is_empty());

    let (response, body) = page(&json!({"pagination": {"next": null}}));
    assert!(advance(paginator.as_ref(), &request, &response, &body, 1).is_none());
}

#[test]
fn test_auto_follows_pokeapi_next() {
    let paginator = PaginatorConfig::Auto.build();
    let request = HttpRequest::get("https://pokeapi.co/api/v2/berry").query("limit", "10000");

    let (response, body) = page(&json!({
        "count": 64,
        "next": "https://pokeapi.co/api/v2/berry?offset=20&limit=20",
        "results": [{"name": "cheri"}]
    }));
    let next = advance(paginator.as_ref(), &request, &response, &body, 1).unwrap();
    assert_eq!(next.url, "https://pokeapi.co/api/v2/berry?offset=20&limit=20");

    let (response, body) = page(&json!({"count": 64, "next": null, "results": []}));
    assert!(advance(paginator.as_ref(), &request, &response, &body, 0).is_none());
}

#[test]
fn test_auto_prefers_link_header() {
    let paginator = AutoPaginator;
    let request = HttpRequest::get("https://api.github.com/issues");
    let response = HttpResponse::new(200, "[]")
        .with_header("link", r#"<https://api.github.com/issues?page=2>; rel="next""#);
    let body = json!([{"id": 1}]);

    let next = advance(&paginator, &request, &response, &body, 1).unwrap();
    assert_eq!(next.url, "https://api.github.com/issues?page=2");
}

#[test]
fn test_auto_ignores_non_url_next() {
    let paginator = AutoPaginator;
    let request = HttpRequest::get("https://api.example.com/items");
    let (response, body) = page(&json!({"next": "abc123", "items": [1]}));
    assert!(advance(&paginator, &request, &response, &body, 1).is_none());
}

#[test]
fn test_single_never_advances() {
    let paginator = PaginatorConfig::Single.build();
    let request = HttpRequest::get("https://api.example.com/items");
    let (response, body) = page(&json!({"next": "https://api.example.com/items?page=2"}));
    assert!(advance(paginator.as_ref(), &request, &response, &body, 1).is_none());
}
