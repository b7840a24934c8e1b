//! Pagination strategy implementations
//!
//! Each strategy handles a specific pagination pattern.

use super::types::{PageResponse, Paginator};
use crate::http::HttpRequest;
use crate::types::{lookup_path, scalar_to_string};
use serde_json::Value;
use url::Url;

// ============================================================================
// JSON Cursor Pagination
// ============================================================================

/// Cursor-in-body pagination (e.g., Zoom, Stripe, Slack)
///
/// Reads a cursor at `cursor_path` and sends it back as `cursor_param`.
/// Common patterns:
/// - `{"next_page_token": "abc"}` → `?next_page_token=abc`
/// - `{"meta": {"cursor": 42}}` → `?cursor=42`
#[derive(Debug, Clone)]
pub struct JsonCursorPaginator {
    /// Dotted path to the cursor in the body
    pub cursor_path: String,
    /// Query parameter name for cursor
    pub cursor_param: String,
    /// Cursor value meaning "no more pages"
    pub stop_value: Option<Value>,
}

impl Paginator for JsonCursorPaginator {
    fn advance(
        &self,
        previous: &HttpRequest,
        page: &PageResponse<'_>,
        _records: usize,
    ) -> Option<HttpRequest> {
        let cursor = lookup_path(page.body, &self.cursor_path)?;
        if self.stop_value.as_ref() == Some(cursor) {
            return None;
        }

        let cursor = scalar_to_string(cursor)?;
        if cursor.is_empty() {
            return None;
        }
        if let Some(Value::String(stop)) = &self.stop_value {
            if *stop == cursor {
                return None;
            }
        }

        let mut next = previous.clone();
        next.set_query(self.cursor_param.clone(), cursor);
        Some(next)
    }
}

// ============================================================================
// Offset Pagination
// ============================================================================

/// Offset-based pagination (e.g., SQL-style pagination)
///
/// Common patterns:
/// - `?offset=100&limit=50`
/// - `?skip=100&take=50`
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    /// Query parameter name for offset
    pub offset_param: String,
    /// Query parameter name for limit
    pub limit_param: String,
    /// Number of records per page
    pub limit: u64,
    /// Dotted path to the total record count
    pub total_path: Option<String>,
}

impl Paginator for OffsetPaginator {
    fn prepare(&self, request: &mut HttpRequest) {
        if request.query_value(&self.offset_param).is_none() {
            request.set_query(self.offset_param.clone(), "0");
        }
        request.set_query(self.limit_param.clone(), self.limit.to_string());
    }

    fn advance(
        &self,
        previous: &HttpRequest,
        page: &PageResponse<'_>,
        records: usize,
    ) -> Option<HttpRequest> {
        // A short page is the last one
        if (records as u64) < self.limit {
            return None;
        }

        let offset = previous
            .query_value(&self.offset_param)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let next_offset = offset + self.limit;

        if let Some(path) = &self.total_path {
            if let Some(total) = lookup_path(page.body, path).and_then(as_u64) {
                if next_offset >= total {
                    return None;
                }
            }
        }

        let mut next = previous.clone();
        next.set_query(self.offset_param.clone(), next_offset.to_string());
        next.set_query(self.limit_param.clone(), self.limit.to_string());
        Some(next)
    }
}

// ============================================================================
// Page Number Pagination
// ============================================================================

/// Page number pagination (e.g., traditional web pagination)
///
/// Common patterns:
/// - `?page=2`
/// - `?page=2&per_page=50`
#[derive(Debug, Clone)]
pub struct PageNumberPaginator {
    /// Query parameter name for page number
    pub page_param: String,
    /// First page number (usually 0 or 1)
    pub start_page: u64,
    /// Optional page size parameter name
    pub page_size_param: Option<String>,
    /// Page size value
    pub page_size: Option<u64>,
    /// Dotted path to the total page count
    pub total_pages_path: Option<String>,
}

impl PageNumberPaginator {
    /// Create a new page number paginator
    pub fn new(page_param: impl Into<String>, start_page: u64) -> Self {
        Self {
            page_param: page_param.into(),
            start_page,
            page_size_param: None,
            page_size: None,
            total_pages_path: None,
        }
    }

    /// Set page size parameter
    #[must_use]
    pub fn with_page_size(mut self, param: impl Into<String>, size: u64) -> Self {
        self.page_size_param = Some(param.into());
        self.page_size = Some(size);
        self
    }

    /// Stop at the page count found at `path`
    #[must_use]
    pub fn with_total_pages(mut self, path: impl Into<String>) -> Self {
        self.total_pages_path = Some(path.into());
        self
    }
}

impl Paginator for PageNumberPaginator {
    fn prepare(&self, request: &mut HttpRequest) {
        request.set_query(self.page_param.clone(), self.start_page.to_string());
        if let (Some(param), Some(size)) = (&self.page_size_param, self.page_size) {
            request.set_query(param.clone(), size.to_string());
        }
    }

    fn advance(
        &self,
        previous: &HttpRequest,
        page: &PageResponse<'_>,
        records: usize,
    ) -> Option<HttpRequest> {
        if records == 0 {
            return None;
        }
        if let Some(size) = self.page_size {
            if (records as u64) < size {
                return None;
            }
        }

        let current = previous
            .query_value(&self.page_param)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(self.start_page);

        if let Some(path) = &self.total_pages_path {
            if let Some(total_pages) = lookup_path(page.body, path).and_then(as_u64) {
                let pages_fetched = current.saturating_sub(self.start_page) + 1;
                if pages_fetched >= total_pages {
                    return None;
                }
            }
        }

        let mut next = previous.clone();
        next.set_query(self.page_param.clone(), (current + 1).to_string());
        Some(next)
    }
}

// ============================================================================
// Link Header Pagination
// ============================================================================

/// Link header pagination (RFC 8288)
///
/// Extracts next page URL from the Link header.
/// Common in GitHub, GitLab APIs.
/// Format: `Link: <https://api.github.com/...?page=2>; rel="next", ...`
#[derive(Debug, Clone)]
pub struct LinkHeaderPaginator {
    /// Rel value to follow (default: "next")
    pub rel: String,
}

impl Default for LinkHeaderPaginator {
    fn default() -> Self {
        Self {
            rel: "next".to_string(),
        }
    }
}

impl LinkHeaderPaginator {
    /// Create a new link header paginator
    pub fn new(rel: impl Into<String>) -> Self {
        Self { rel: rel.into() }
    }
}

impl Paginator for LinkHeaderPaginator {
    fn advance(
        &self,
        previous: &HttpRequest,
        page: &PageResponse<'_>,
        _records: usize,
    ) -> Option<HttpRequest> {
        let header = page.header("link")?;
        let url = parse_link_header(header, &self.rel)?;
        Some(previous.follow(resolve_url(&previous.url, &url)))
    }
}

/// Parse a Link header and extract the URL for the given rel
pub fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    // Link header format: <url>; rel="next", <url>; rel="prev"
    for part in header.split(',') {
        let part = part.trim();
        let mut url = None;
        let mut rels = None;

        for segment in part.split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(stripped) = segment.strip_prefix("rel=") {
                rels = Some(stripped.trim_matches('"').trim_matches('\''));
            }
        }

        // rel may carry several space-separated relation types
        if let (Some(u), Some(r)) = (url, rels) {
            if r.split_whitespace().any(|rel| rel == target_rel) {
                return Some(u.to_string());
            }
        }
    }

    None
}

// ============================================================================
// Next URL Pagination
// ============================================================================

/// Next URL pagination (URL in response body)
///
/// Common patterns:
/// - `{ "next": "https://pokeapi.co/api/v2/berry?offset=20&limit=20" }`
/// - `{ "pagination": { "next_url": "..." } }`
#[derive(Debug, Clone)]
pub struct NextUrlPaginator {
    /// Dotted path to the next URL
    pub next_url_path: String,
}

impl NextUrlPaginator {
    /// Create a new next URL paginator
    pub fn new(next_url_path: impl Into<String>) -> Self {
        Self {
            next_url_path: next_url_path.into(),
        }
    }
}

impl Paginator for NextUrlPaginator {
    fn advance(
        &self,
        previous: &HttpRequest,
        page: &PageResponse<'_>,
        _records: usize,
    ) -> Option<HttpRequest> {
        let next = lookup_path(page.body, &self.next_url_path)?.as_str()?;
        if next.is_empty() {
            return None;
        }
        Some(previous.follow(resolve_url(&previous.url, next)))
    }
}

// ============================================================================
// Auto-detected Pagination
// ============================================================================

/// Default strategy when nothing is configured.
///
/// Follows a `Link` header with `rel="next"` if present, else a string `next`
/// field that holds a URL, else treats the response as the only page.
#[derive(Debug, Clone, Default)]
pub struct AutoPaginator;

impl Paginator for AutoPaginator {
    fn advance(
        &self,
        previous: &HttpRequest,
        page: &PageResponse<'_>,
        records: usize,
    ) -> Option<HttpRequest> {
        if page.header("link").is_some() {
            return LinkHeaderPaginator::default().advance(previous, page, records);
        }

        let next = page.body.get("next")?.as_str()?;
        if next.starts_with("http://") || next.starts_with("https://") || next.starts_with('/') {
            Some(previous.follow(resolve_url(&previous.url, next)))
        } else {
            None
        }
    }
}

// ============================================================================
// No Pagination
// ============================================================================

/// No pagination - single request
#[derive(Debug, Clone, Default)]
pub struct SinglePaginator;

impl Paginator for SinglePaginator {
    fn advance(
        &self,
        _previous: &HttpRequest,
        _page: &PageResponse<'_>,
        _records: usize,
    ) -> Option<HttpRequest> {
        None
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Resolve a possibly relative next-page URL against the current one
fn resolve_url(base: &str, next: &str) -> String {
    match Url::parse(base).and_then(|base| base.join(next)) {
        Ok(url) => url.to_string(),
        Err(_) => next.to_string(),
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
