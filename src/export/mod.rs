//! Export functionality
//!
//! Persists the clean intermediate tables (`pet_types`, `breeds`,
//! `shelters`, `animals`) as CSV and Parquet files.

pub mod tables;

/// Error during export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Write failed: {0}")]
    WriteFailed(String),
    #[error("Invalid table {table}: {reason}")]
    InvalidTable { table: String, reason: String },
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::IoError(err.to_string())
    }
}

impl From<duckdb::Error> for ExportError {
    fn from(err: duckdb::Error) -> Self {
        ExportError::WriteFailed(err.to_string())
    }
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

pub use tables::CleanTableWriter;
