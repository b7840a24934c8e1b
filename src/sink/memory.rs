//! In-process sink

use super::types::{prepare_rows, LoadStats, Sink, Staging, StreamHandle};
use crate::error::{Error, Result};
use crate::types::{record_key, WriteDisposition};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;

/// Sink keeping every table in memory.
///
/// Applies the same disposition semantics as the DuckDB sink; used for dry
/// runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    staging: Staging,
    tables: Mutex<BTreeMap<String, Vec<Value>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed rows of `resource`
    pub fn records(&self, resource: &str) -> Vec<Value> {
        self.tables
            .lock()
            .map(|tables| tables.get(resource).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Names of the tables written so far
    pub fn tables(&self) -> Vec<String> {
        self.tables
            .lock()
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn open(
        &self,
        resource: &str,
        disposition: WriteDisposition,
        primary_key: &[String],
    ) -> Result<StreamHandle> {
        self.staging.open(resource, disposition, primary_key)
    }

    async fn write(&self, handle: &StreamHandle, record: Value) -> Result<()> {
        self.staging.push(handle, vec![record])
    }

    async fn write_batch(&self, handle: &StreamHandle, records: Vec<Value>) -> Result<()> {
        self.staging.push(handle, records)
    }

    async fn close(&self, handle: StreamHandle) -> Result<LoadStats> {
        let stream = self.staging.take(&handle)?;
        let records_written = stream.records.len() as u64;
        let rows = prepare_rows(stream);
        let rows_loaded = rows.len() as u64;

        let mut tables = self
            .tables
            .lock()
            .map_err(|_| Error::sink("memory sink lock poisoned"))?;
        let table = tables.entry(handle.resource.clone()).or_default();

        match handle.disposition {
            WriteDisposition::Replace => {
                *table = rows.into_iter().map(|row| row.record).collect();
            }
            WriteDisposition::Append => {
                table.extend(rows.into_iter().map(|row| row.record));
            }
            WriteDisposition::Merge => {
                for row in rows {
                    let existing = row.key.as_ref().and_then(|key| {
                        table
                            .iter()
                            .position(|r| record_key(r, &handle.primary_key).as_ref() == Some(key))
                    });
                    match existing {
                        Some(pos) => table[pos] = row.record,
                        None => table.push(row.record),
                    }
                }
            }
        }

        debug!(resource = %handle.resource, rows_loaded, "Committed stream");
        Ok(LoadStats {
            resource: handle.resource,
            records_written,
            rows_loaded,
            table_rows: table.len() as u64,
        })
    }

    async fn abort(&self, handle: StreamHandle) -> Result<()> {
        let stream = self.staging.take(&handle)?;
        debug!(
            resource = %handle.resource,
            discarded = stream.records.len(),
            "Aborted stream"
        );
        Ok(())
    }
}
