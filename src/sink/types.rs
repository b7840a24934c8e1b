//! Sink types and traits

use crate::error::{Error, Result};
use crate::types::{record_key, WriteDisposition};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// An open record stream of one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    /// Stream id, unique per sink
    pub id: u64,
    /// Resource the stream belongs to
    pub resource: String,
    /// How the records combine with the table
    pub disposition: WriteDisposition,
    /// Primary key columns (merge only)
    pub primary_key: Vec<String>,
}

/// Per-resource load statistics returned by `close`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    /// Resource name
    pub resource: String,
    /// Records received on the stream
    pub records_written: u64,
    /// Rows stored after staging dedup
    pub rows_loaded: u64,
    /// Rows in the destination table after commit
    pub table_rows: u64,
}

/// Destination for extracted records
#[async_trait]
pub trait Sink: Send + Sync {
    /// Open a stream for `resource`
    async fn open(
        &self,
        resource: &str,
        disposition: WriteDisposition,
        primary_key: &[String],
    ) -> Result<StreamHandle>;

    /// Stage one record
    async fn write(&self, handle: &StreamHandle, record: Value) -> Result<()>;

    /// Stage a batch of records
    async fn write_batch(&self, handle: &StreamHandle, records: Vec<Value>) -> Result<()> {
        for record in records {
            self.write(handle, record).await?;
        }
        Ok(())
    }

    /// Commit the stream
    async fn close(&self, handle: StreamHandle) -> Result<LoadStats>;

    /// Discard the stream's staged records
    async fn abort(&self, handle: StreamHandle) -> Result<()>;
}

// ============================================================================
// Staging shared by the sink implementations
// ============================================================================

/// Records staged for one open stream
#[derive(Debug)]
pub(crate) struct StagedStream {
    pub handle: StreamHandle,
    pub records: Vec<Value>,
}

/// Open-stream registry
#[derive(Debug, Default)]
pub(crate) struct Staging {
    next_id: AtomicU64,
    streams: std::sync::Mutex<HashMap<u64, StagedStream>>,
}

impl Staging {
    pub fn open(
        &self,
        resource: &str,
        disposition: WriteDisposition,
        primary_key: &[String],
    ) -> Result<StreamHandle> {
        let handle = StreamHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            resource: resource.to_string(),
            disposition,
            primary_key: primary_key.to_vec(),
        };
        self.lock()?.insert(
            handle.id,
            StagedStream {
                handle: handle.clone(),
                records: Vec::new(),
            },
        );
        Ok(handle)
    }

    pub fn push(&self, handle: &StreamHandle, records: Vec<Value>) -> Result<()> {
        let mut streams = self.lock()?;
        let stream = streams
            .get_mut(&handle.id)
            .ok_or_else(|| Error::sink(format!("stream for '{}' is not open", handle.resource)))?;
        stream.records.extend(records);
        Ok(())
    }

    pub fn take(&self, handle: &StreamHandle) -> Result<StagedStream> {
        self.lock()?
            .remove(&handle.id)
            .ok_or_else(|| Error::sink(format!("stream for '{}' is not open", handle.resource)))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<u64, StagedStream>>> {
        self.streams
            .lock()
            .map_err(|_| Error::sink("sink staging lock poisoned"))
    }
}

/// A staged row ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct KeyedRecord {
    pub key: Option<String>,
    pub record: Value,
}

/// Attach keys and, for merge streams, keep only the last record per key
pub(crate) fn prepare_rows(stream: StagedStream) -> Vec<KeyedRecord> {
    let StagedStream { handle, records } = stream;
    let dedup = handle.disposition == WriteDisposition::Merge;

    let mut rows: Vec<KeyedRecord> = Vec::with_capacity(records.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = record_key(&record, &handle.primary_key);
        match key.as_ref().and_then(|k| positions.get(k)).copied() {
            Some(pos) if dedup => rows[pos].record = record,
            _ => {
                if let (true, Some(k)) = (dedup, &key) {
                    positions.insert(k.clone(), rows.len());
                }
                rows.push(KeyedRecord { key, record });
            }
        }
    }

    rows
}
