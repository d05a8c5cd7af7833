// =============================================================================
// Persistence Sink
// =============================================================================
//
// Append-only tabular persistence behind a narrow trait: the exporter hands
// over ordered key→value rows, the sink owns file layout. The production
// sink writes one CSV per table under the configured output directory,
// header first, then appends across process restarts. A header is written
// only when the file is created, so repeated exports keep extending the
// same table.
// =============================================================================

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::SinkError;

// =============================================================================
// Row
// =============================================================================

/// Ordered key→value record. Keys double as CSV column headers; all rows
/// appended to one table are expected to share the same key set and order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row(Vec<(String, String)>);

impl Row {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Builder-style variant of [`push`](Self::push).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// RowSink
// =============================================================================

/// Destination for exported tables.
pub trait RowSink: Send + Sync {
    /// Append `rows` to `table`, creating it on first write. Returns the
    /// number of rows appended.
    fn append_rows(&self, table: &str, rows: &[Row]) -> Result<usize, SinkError>;

    /// Read a table back in append order.
    fn read_rows(&self, table: &str) -> Result<Vec<Row>, SinkError>;
}

// =============================================================================
// CsvSink
// =============================================================================

/// One `{table}.csv` file per table under a base directory.
pub struct CsvSink {
    dir: PathBuf,
}

impl CsvSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, table: &str) -> Result<PathBuf, SinkError> {
        // Table names come from a fixed internal set, but never let one
        // escape the output directory.
        let valid = !table.is_empty()
            && table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(SinkError::UnknownTable {
                table: table.to_string(),
            });
        }
        Ok(self.dir.join(format!("{table}.csv")))
    }
}

impl RowSink for CsvSink {
    fn append_rows(&self, table: &str, rows: &[Row]) -> Result<usize, SinkError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let path = self.table_path(table)?;
        let io_err = |source| SinkError::Io {
            table: table.to_string(),
            source,
        };
        let csv_err = |source| SinkError::Csv {
            table: table.to_string(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let fresh = !path.exists();
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        let mut writer = csv::Writer::from_writer(file);
        if fresh {
            writer.write_record(rows[0].keys()).map_err(csv_err)?;
        }
        for row in rows {
            writer.write_record(row.values()).map_err(csv_err)?;
        }
        writer.flush().map_err(io_err)?;

        debug!(table, rows = rows.len(), path = %path.display(), "rows appended");
        Ok(rows.len())
    }

    fn read_rows(&self, table: &str) -> Result<Vec<Row>, SinkError> {
        let path = self.table_path(table)?;
        if !path.exists() {
            return Err(SinkError::UnknownTable {
                table: table.to_string(),
            });
        }
        let csv_err = |source| SinkError::Csv {
            table: table.to_string(),
            source,
        };

        let mut reader = csv::Reader::from_path(&path).map_err(csv_err)?;
        let headers = reader.headers().map_err(csv_err)?.clone();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            let mut row = Row::new();
            for (key, value) in headers.iter().zip(record.iter()) {
                row.push(key, value);
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

// =============================================================================
// MemorySink
// =============================================================================

/// In-memory sink for tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    tables: Mutex<HashMap<String, Vec<Row>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RowSink for MemorySink {
    fn append_rows(&self, table: &str, rows: &[Row]) -> Result<usize, SinkError> {
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .extend_from_slice(rows);
        Ok(rows.len())
    }

    fn read_rows(&self, table: &str) -> Result<Vec<Row>, SinkError> {
        self.tables
            .lock()
            .get(table)
            .cloned()
            .ok_or_else(|| SinkError::UnknownTable {
                table: table.to_string(),
            })
    }
}
