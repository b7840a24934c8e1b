//! Incremental cursor tracking
//!
//! # Overview
//!
//! For a resource with an incremental spec, the tracker injects the stored
//! watermark as a request parameter, watches the cursor field of every record
//! fetched, and hands back the new watermark once the resource finished. It
//! also keeps the per-run set of primary keys already seen for `merge`
//! resources, so a record re-sent by the API (overlapping windows, shifting
//! pages) is counted once.

mod tracker;
mod types;

pub use tracker::CursorTracker;
pub use types::{compare_cursor, IncrementalSpec, LastValueFunc};
