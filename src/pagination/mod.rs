//! Pagination module
//!
//! Supports: JSON Cursor, Offset, Page Number, Link Header, Next URL, Single,
//! Auto
//!
//! # Overview
//!
//! The pagination module provides a unified interface for handling different
//! API pagination patterns. Given the previous request and the page it
//! produced, each strategy either builds the request for the next page or
//! signals exhaustion. Position lives in the request, never in the paginator.

mod strategies;
mod types;

pub use strategies::{
    parse_link_header, AutoPaginator, JsonCursorPaginator, LinkHeaderPaginator,
    NextUrlPaginator, OffsetPaginator, PageNumberPaginator, SinglePaginator,
};
pub use types::{PageResponse, PaginatorConfig, Paginator};

#[cfg(test)]
mod tests;
