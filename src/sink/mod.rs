//! Destination sinks
//!
//! Supports: in-memory, DuckDB
//!
//! # Overview
//!
//! The engine emits each resource's records into one stream opened with the
//! resource's write disposition. Records are staged per stream and applied
//! when the stream is closed: `replace` swaps the table contents, `append`
//! adds rows, `merge` upserts by primary key with the last record winning.
//! A stream of a failed resource is aborted and nothing reaches the table.

mod duckdb;
mod memory;
mod types;

pub use self::duckdb::DuckDbSink;
pub use memory::MemorySink;
pub use types::{LoadStats, Sink, StreamHandle};
