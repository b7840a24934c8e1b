//! Pagination types and traits
//!
//! Defines the paginator configuration and the core trait implemented by all
//! strategies.

use super::strategies::{
    AutoPaginator, JsonCursorPaginator, LinkHeaderPaginator, NextUrlPaginator, OffsetPaginator,
    PageNumberPaginator, SinglePaginator,
};
use crate::http::{HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One decoded page, as seen by a paginator
#[derive(Debug, Clone, Copy)]
pub struct PageResponse<'a> {
    /// Response status
    pub status: u16,
    /// Response headers, names lowercased
    pub headers: &'a HashMap<String, String>,
    /// Parsed JSON body
    pub body: &'a Value,
}

impl<'a> PageResponse<'a> {
    /// View an HTTP response together with its parsed body
    pub fn new(response: &'a HttpResponse, body: &'a Value) -> Self {
        Self {
            status: response.status,
            headers: &response.headers,
            body,
        }
    }

    /// Get a header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Paginator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginatorConfig {
    /// Follow a `Link: rel="next"` header, else a `next` URL in the body
    #[default]
    Auto,

    /// A single request, no pagination
    #[serde(alias = "single_page")]
    Single,

    /// Cursor value inside the JSON body (Zoom `next_page_token`, Stripe)
    #[serde(alias = "cursor")]
    JsonCursor {
        /// Dotted path to the cursor in the body
        cursor_path: String,
        /// Query parameter that receives the cursor
        cursor_param: String,
        /// Cursor value meaning "no more pages"
        #[serde(default)]
        stop_value: Option<Value>,
    },

    /// `?offset=100&limit=50`
    Offset {
        /// Query parameter name for offset
        #[serde(default = "default_offset_param")]
        offset_param: String,
        /// Query parameter name for limit
        #[serde(default = "default_limit_param")]
        limit_param: String,
        /// Number of records per page
        limit: u64,
        /// Dotted path to the total record count
        #[serde(default)]
        total_path: Option<String>,
    },

    /// `?page=2&per_page=50`
    PageNumber {
        /// Query parameter name for page number
        #[serde(default = "default_page_param")]
        page_param: String,
        /// First page number (usually 0 or 1)
        #[serde(default = "default_start_page")]
        start_page: u64,
        /// Optional page size parameter name
        #[serde(default)]
        page_size_param: Option<String>,
        /// Page size value
        #[serde(default)]
        page_size: Option<u64>,
        /// Dotted path to the total page count
        #[serde(default)]
        total_pages_path: Option<String>,
    },

    /// Link header pagination (RFC 8288)
    #[serde(alias = "header_link")]
    LinkHeader {
        /// Rel value to follow
        #[serde(default = "default_rel")]
        rel: String,
    },

    /// Absolute (or relative) URL of the next page in the body
    #[serde(alias = "json_link")]
    NextUrl {
        /// Dotted path to the next URL
        #[serde(default = "default_next_url_path")]
        next_url_path: String,
    },
}

fn default_offset_param() -> String {
    "offset".to_string()
}

fn default_limit_param() -> String {
    "limit".to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_start_page() -> u64 {
    1
}

fn default_rel() -> String {
    "next".to_string()
}

fn default_next_url_path() -> String {
    "next".to_string()
}

impl PaginatorConfig {
    /// Create JSON cursor pagination config
    pub fn json_cursor(cursor_path: impl Into<String>, cursor_param: impl Into<String>) -> Self {
        Self::JsonCursor {
            cursor_path: cursor_path.into(),
            cursor_param: cursor_param.into(),
            stop_value: None,
        }
    }

    /// Create offset pagination config
    pub fn offset(limit: u64) -> Self {
        Self::Offset {
            offset_param: default_offset_param(),
            limit_param: default_limit_param(),
            limit,
            total_path: None,
        }
    }

    /// Create page number pagination config
    pub fn page_number(page_param: impl Into<String>, start_page: u64) -> Self {
        Self::PageNumber {
            page_param: page_param.into(),
            start_page,
            page_size_param: None,
            page_size: None,
            total_pages_path: None,
        }
    }

    /// Create link header pagination config
    pub fn link_header() -> Self {
        Self::LinkHeader { rel: default_rel() }
    }

    /// Create next URL pagination config
    pub fn next_url(next_url_path: impl Into<String>) -> Self {
        Self::NextUrl {
            next_url_path: next_url_path.into(),
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Single => "single",
            Self::JsonCursor { .. } => "json_cursor",
            Self::Offset { .. } => "offset",
            Self::PageNumber { .. } => "page_number",
            Self::LinkHeader { .. } => "link_header",
            Self::NextUrl { .. } => "next_url",
        }
    }

    /// Build the strategy for this configuration
    pub fn build(&self) -> Arc<dyn Paginator> {
        match self {
            Self::Auto => Arc::new(AutoPaginator),
            Self::Single => Arc::new(SinglePaginator),
            Self::JsonCursor {
                cursor_path,
                cursor_param,
                stop_value,
            } => Arc::new(JsonCursorPaginator {
                cursor_path: cursor_path.clone(),
                cursor_param: cursor_param.clone(),
                stop_value: stop_value.clone(),
            }),
            Self::Offset {
                offset_param,
                limit_param,
                limit,
                total_path,
            } => Arc::new(OffsetPaginator {
                offset_param: offset_param.clone(),
                limit_param: limit_param.clone(),
                limit: *limit,
                total_path: total_path.clone(),
            }),
            Self::PageNumber {
                page_param,
                start_page,
                page_size_param,
                page_size,
                total_pages_path,
            } => Arc::new(PageNumberPaginator {
                page_param: page_param.clone(),
                start_page: *start_page,
                page_size_param: page_size_param.clone(),
                page_size: *page_size,
                total_pages_path: total_pages_path.clone(),
            }),
            Self::LinkHeader { rel } => Arc::new(LinkHeaderPaginator::new(rel.clone())),
            Self::NextUrl { next_url_path } => {
                Arc::new(NextUrlPaginator::new(next_url_path.clone()))
            }
        }
    }
}

/// Core trait for pagination strategies.
///
/// Paginators hold no per-run state: the position travels in the request
/// itself, so one instance can serve every request chain of a resource.
pub trait Paginator: Send + Sync + std::fmt::Debug {
    /// Set the first-page parameters on the initial request
    fn prepare(&self, _request: &mut HttpRequest) {}

    /// Compute the request for the page after `previous`.
    ///
    /// `records` is the number of records extracted from `page`. Returns
    /// `None` when the chain is exhausted.
    fn advance(
        &self,
        previous: &HttpRequest,
        page: &PageResponse<'_>,
        records: usize,
    ) -> Option<HttpRequest>;
}
