//! Import functionality
//!
//! Provides readers for the two tabular inputs of the pipeline:
//! - Raw snapshot CSV files (`animals_snapshot_*.csv`)
//! - Clean intermediate tables (CSV or Parquet) written by the transform
//!
//! Both go through an in-memory DuckDB connection with every column read as
//! text, so no value is coerced before the pipeline decides how to.

pub mod clean;
pub mod snapshot;

use std::path::{Path, PathBuf};

/// Error while reading snapshot or clean table input
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot not found: {0}")]
    NotFound(PathBuf),
    #[error("No snapshots found in '{dir}' (expected {pattern})")]
    NoSnapshots { dir: PathBuf, pattern: String },
    #[error("Schema error: {file} is missing required columns: {missing:?}")]
    MissingColumns { file: String, missing: Vec<String> },
    #[error("Ambiguous batch: {0}")]
    AmbiguousBatch(String),
    #[error("Read failed: {0}")]
    ReadFailed(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<duckdb::Error> for SnapshotError {
    fn from(err: duckdb::Error) -> Self {
        SnapshotError::ReadFailed(err.to_string())
    }
}

impl From<std::io::Error> for SnapshotError {
    fn from(err: std::io::Error) -> Self {
        SnapshotError::IoError(err.to_string())
    }
}

/// Result type for import operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Render a path as a single-quoted SQL string literal
pub(crate) fn sql_path(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "''"))
}

/// Double-quote a SQL identifier
pub(crate) fn sql_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column names of a table-valued DuckDB expression, in order
pub(crate) fn describe_columns(
    conn: &duckdb::Connection,
    source: &str,
) -> Result<Vec<String>, duckdb::Error> {
    let mut stmt = conn.prepare(&format!("DESCRIBE SELECT * FROM {}", source))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(0)?);
    }
    Ok(columns)
}

/// Read `columns` from `source` as text, column-wise
pub(crate) fn read_text_columns(
    conn: &duckdb::Connection,
    source: &str,
    columns: &[&str],
) -> Result<Vec<Vec<Option<String>>>, duckdb::Error> {
    let select = columns
        .iter()
        .map(|c| format!("CAST({} AS VARCHAR)", sql_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = conn.prepare(&format!("SELECT {} FROM {}", select, source))?;
    let mut rows = stmt.query([])?;

    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); columns.len()];
    while let Some(row) = rows.next()? {
        for (i, column) in values.iter_mut().enumerate() {
            column.push(row.get::<_, Option<String>>(i)?);
        }
    }
    Ok(values)
}

pub use clean::CleanTableReader;
pub use snapshot::SnapshotReader;
