//! Destination store abstraction for incremental loads
//!
//! This module provides the upsert capability contract the loader writes
//! through, with one implementation per backend:
//! - DuckDB: Embedded file database, and in-memory for tests
//! - PostgreSQL: The shared relational store
//!
//! On top of the [`Destination`] trait sit the [`SnapshotTracker`] (the
//! `loaded_snapshots` ledger) and the [`IncrementalLoader`] that applies one
//! snapshot's clean tables at most once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{CleanTable, SnapshotLedgerEntry, TableData};

pub mod duckdb;

#[cfg(feature = "postgres-backend")]
pub mod postgres;

pub mod config;
pub mod schema;
pub mod sync;
pub mod tracker;

pub use self::duckdb::DuckDBDestination;

#[cfg(feature = "postgres-backend")]
pub use self::postgres::PostgresDestination;

pub use config::{DestinationBackendType, DestinationConfig, PipelineConfig};
pub use schema::DestinationSchema;
pub use sync::{IncrementalLoader, LoadOutcome, LoadReport, TableLoad};
pub use tracker::SnapshotTracker;

/// Rows per multi-row upsert statement
pub const UPSERT_PAGE_SIZE: usize = 1000;

/// Error type for destination operations
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Failed to connect to the destination
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A required credential is not configured
    #[error("Missing credential: {0} is not set")]
    MissingCredential(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema creation failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Transaction failed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// The batch does not carry exactly one snapshot identity
    #[error("Ambiguous batch: {0}")]
    AmbiguousBatch(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type for destination operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Outcome of a ledger insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerInsert {
    /// The row was written
    Inserted,
    /// A row for this snapshot file already existed
    Conflict,
}

/// Destination store trait for the incremental loader
///
/// Every mutation is an upsert or a ledger insert; nothing here deletes.
/// All operations are async so the PostgreSQL client can be driven without
/// blocking.
#[async_trait(?Send)]
pub trait Destination: Send + Sync {
    /// Create the destination tables if they don't exist
    ///
    /// Never drops or resets anything.
    async fn initialize(&self) -> DatabaseResult<()>;

    /// Create the `loaded_snapshots` ledger if it doesn't exist
    async fn ensure_ledger(&self) -> DatabaseResult<()>;

    /// Upsert a clean table in its own committed transaction
    ///
    /// # Arguments
    /// * `table` - Target table; its primary key is the conflict key
    /// * `data` - Rows in the table's layout, unique by conflict key
    ///
    /// # Returns
    /// Number of rows written
    async fn upsert(&self, table: CleanTable, data: &TableData) -> DatabaseResult<usize>;

    /// Check whether the ledger holds `snapshot_file`
    ///
    /// # Arguments
    /// * `snapshot_file` - Snapshot file name
    ///
    /// # Returns
    /// True if a ledger row exists
    async fn snapshot_loaded(&self, snapshot_file: &str) -> DatabaseResult<bool>;

    /// Insert a ledger row
    ///
    /// # Arguments
    /// * `entry` - Snapshot to record; `loaded_at` is assigned by the store
    ///
    /// # Returns
    /// [`LedgerInsert::Conflict`] if the primary key was already taken
    async fn insert_ledger_entry(&self, entry: &SnapshotLedgerEntry)
    -> DatabaseResult<LedgerInsert>;

    /// List ledger rows ordered by `loaded_at`
    async fn ledger_entries(&self) -> DatabaseResult<Vec<SnapshotLedgerEntry>>;

    /// Count rows of a destination table
    ///
    /// # Arguments
    /// * `table` - One of [`DestinationSchema::TABLES`]
    async fn count_rows(&self, table: &str) -> DatabaseResult<u64>;

    /// Check if the destination is reachable
    async fn health_check(&self) -> DatabaseResult<bool>;

    /// Backend type name ("duckdb" or "postgres")
    fn backend_type(&self) -> &'static str;
}

#[async_trait(?Send)]
impl<D: Destination + ?Sized> Destination for Box<D> {
    async fn initialize(&self) -> DatabaseResult<()> {
        (**self).initialize().await
    }

    async fn ensure_ledger(&self) -> DatabaseResult<()> {
        (**self).ensure_ledger().await
    }

    async fn upsert(&self, table: CleanTable, data: &TableData) -> DatabaseResult<usize> {
        (**self).upsert(table, data).await
    }

    async fn snapshot_loaded(&self, snapshot_file: &str) -> DatabaseResult<bool> {
        (**self).snapshot_loaded(snapshot_file).await
    }

    async fn insert_ledger_entry(
        &self,
        entry: &SnapshotLedgerEntry,
    ) -> DatabaseResult<LedgerInsert> {
        (**self).insert_ledger_entry(entry).await
    }

    async fn ledger_entries(&self) -> DatabaseResult<Vec<SnapshotLedgerEntry>> {
        (**self).ledger_entries().await
    }

    async fn count_rows(&self, table: &str) -> DatabaseResult<u64> {
        (**self).count_rows(table).await
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        (**self).health_check().await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}

/// Build a ledger entry from a row read back as text
pub(crate) fn ledger_entry_from_text(
    snapshot_file: String,
    snapshot_date: &str,
    loaded_at: Option<&str>,
) -> DatabaseResult<SnapshotLedgerEntry> {
    let date = chrono::NaiveDate::parse_from_str(snapshot_date.trim(), "%Y-%m-%d").map_err(|e| {
        DatabaseError::SerializationError(format!(
            "Invalid snapshot_date '{}' in ledger: {}",
            snapshot_date, e
        ))
    })?;
    let mut entry = SnapshotLedgerEntry::new(snapshot_file, date);
    entry.loaded_at = loaded_at.and_then(parse_timestamp);
    Ok(entry)
}

/// Parse a timestamp rendered as text by DuckDB or PostgreSQL
fn parse_timestamp(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let value = value.trim();
    for format in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%#z"] {
        if let Ok(ts) = chrono::DateTime::parse_from_str(value, format) {
            return Some(ts.with_timezone(&chrono::Utc));
        }
    }
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Summary of a destination, as printed by the CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DestinationStatus {
    /// Backend type name
    pub backend: String,
    /// Row count per destination table
    pub row_counts: Vec<(String, u64)>,
    /// Applied snapshots, oldest first
    pub snapshots: Vec<SnapshotLedgerEntry>,
}

impl DestinationStatus {
    /// Read row counts and the ledger from an initialized destination
    pub async fn collect<D: Destination + ?Sized>(destination: &D) -> DatabaseResult<Self> {
        let tracker = SnapshotTracker::new(destination);
        tracker.ensure().await?;

        let mut row_counts = Vec::with_capacity(DestinationSchema::TABLES.len());
        for table in DestinationSchema::TABLES {
            row_counts.push((table.to_string(), destination.count_rows(table).await?));
        }

        Ok(Self {
            backend: destination.backend_type().to_string(),
            row_counts,
            snapshots: tracker.entries().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate, Timelike};

    #[test]
    fn test_ledger_entry_from_text() {
        let entry = ledger_entry_from_text(
            "animals_snapshot_20250601_000000.csv".to_string(),
            "2025-06-01",
            Some("2025-06-02 10:11:12.345+00"),
        )
        .unwrap();
        assert_eq!(entry.snapshot_date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        let loaded_at = entry.loaded_at.unwrap();
        assert_eq!(loaded_at.day(), 2);
        assert_eq!(loaded_at.hour(), 10);
    }

    #[test]
    fn test_ledger_entry_rejects_bad_date() {
        let result = ledger_entry_from_text("x.csv".to_string(), "June 1st", None);
        assert!(matches!(result, Err(DatabaseError::SerializationError(_))));
    }

    #[tokio::test]
    async fn test_status_of_boxed_destination() {
        let destination: Box<dyn Destination> = Box::new(DuckDBDestination::in_memory().unwrap());
        destination.initialize().await.unwrap();
        destination
            .insert_ledger_entry(&SnapshotLedgerEntry::new(
                "animals_snapshot_20250601_000000.csv",
                NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            ))
            .await
            .unwrap();

        let status = DestinationStatus::collect(&destination).await.unwrap();
        assert_eq!(status.backend, "duckdb");
        assert_eq!(status.row_counts.len(), 5);
        assert!(status.row_counts.contains(&("animals".to_string(), 0)));
        assert!(status.row_counts.contains(&(schema::LEDGER_TABLE.to_string(), 1)));
        assert_eq!(status.snapshots.len(), 1);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert!(parse_timestamp("2025-06-02 10:11:12+00").is_some());
        assert!(parse_timestamp("2025-06-02 10:11:12.5+02:00").is_some());
        assert!(parse_timestamp("2025-06-02 10:11:12.123456").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
