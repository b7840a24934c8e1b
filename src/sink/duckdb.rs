//! DuckDB destination
//!
//! One table per resource with the columns `_key` (primary key, merge only),
//! `_loaded_at`, and `data` (the record as JSON text). Every stream is applied
//! in a single transaction when it is closed.

use super::types::{prepare_rows, KeyedRecord, LoadStats, Sink, Staging, StreamHandle};
use crate::error::{Error, Result};
use crate::types::WriteDisposition;
use async_trait::async_trait;
use ::duckdb::{params, Connection};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Sink writing into a DuckDB database file
pub struct DuckDbSink {
    /// DuckDB connection
    conn: Arc<Mutex<Connection>>,
    /// Schema holding the resource tables
    dataset: String,
    /// Database file (None for in-memory)
    path: Option<PathBuf>,
    staging: Staging,
}

impl DuckDbSink {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>, dataset: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .map_err(|e| Error::sink(format!("Failed to open DuckDB at {}: {e}", path.display())))?;
        info!(path = %path.display(), dataset, "Opened DuckDB destination");
        Self::with_connection(conn, dataset, Some(path))
    }

    /// In-memory database
    pub fn in_memory(dataset: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::sink(format!("Failed to create DuckDB connection: {e}")))?;
        Self::with_connection(conn, dataset, None)
    }

    fn with_connection(conn: Connection, dataset: &str, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(&format!(
            "CREATE SCHEMA IF NOT EXISTS {};",
            quote_ident(dataset)
        ))
        .map_err(|e| Error::sink(format!("Failed to create dataset '{dataset}': {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dataset: dataset.to_string(),
            path,
            staging: Staging::default(),
        })
    }

    /// Database file path
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Qualified table name of a resource
    pub fn table_name(&self, resource: &str) -> String {
        format!("{}.{}", quote_ident(&self.dataset), quote_ident(resource))
    }

    /// Stored records of a resource, in insertion order
    pub fn records(&self, resource: &str) -> Result<Vec<Value>> {
        let conn = self.lock()?;
        let sql = format!("SELECT data FROM {} ORDER BY rowid", self.table_name(resource));
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.iter()
            .map(|data| serde_json::from_str(data).map_err(Error::from))
            .collect()
    }

    /// Number of stored rows of a resource
    pub fn row_count(&self, resource: &str) -> Result<u64> {
        let conn = self.lock()?;
        count_rows(&conn, &self.table_name(resource))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::sink("DuckDB connection lock poisoned"))
    }
}

impl std::fmt::Debug for DuckDbSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbSink")
            .field("dataset", &self.dataset)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Sink for DuckDbSink {
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

        let conn = Arc::clone(&self.conn);
        let table = self.table_name(&handle.resource);
        let disposition = handle.disposition;

        let table_rows = tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| Error::sink("DuckDB connection lock poisoned"))?;
            commit_rows(&mut conn, &table, disposition, &rows)
        })
        .await
        .map_err(|e| Error::sink(format!("DuckDB commit task failed: {e}")))??;

        debug!(resource = %handle.resource, rows_loaded, table_rows, "Committed stream");
        Ok(LoadStats {
            resource: handle.resource,
            records_written,
            rows_loaded,
            table_rows,
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

/// Apply one stream in a transaction; returns the table's row count
fn commit_rows(
    conn: &mut Connection,
    table: &str,
    disposition: WriteDisposition,
    rows: &[KeyedRecord],
) -> Result<u64> {
    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (_key VARCHAR, _loaded_at TIMESTAMP, data VARCHAR);"
    ))?;

    match disposition {
        WriteDisposition::Replace => {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }
        WriteDisposition::Merge => {
            let mut delete = tx.prepare(&format!("DELETE FROM {table} WHERE _key = ?"))?;
            for key in rows.iter().filter_map(|row| row.key.as_deref()) {
                delete.execute(params![key])?;
            }
        }
        WriteDisposition::Append => {}
    }

    {
        let loaded_at = chrono::Utc::now()
            .naive_utc()
            .format("%Y-%m-%d %H:%M:%S%.6f")
            .to_string();
        let mut insert = tx.prepare(&format!(
            "INSERT INTO {table} (_key, _loaded_at, data) VALUES (?, CAST(? AS TIMESTAMP), ?)"
        ))?;
        for row in rows {
            insert.execute(params![row.key, loaded_at, row.record.to_string()])?;
        }
    }

    let count = count_rows(&tx, table)?;
    tx.commit()?;
    Ok(count)
}

fn count_rows(conn: &Connection, table: &str) -> Result<u64> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(count.max(0) as u64)
}

/// Double-quote an identifier
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
