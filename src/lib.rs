//! Shelter Data Pipeline - Snapshot transform and incremental loader
//!
//! Provides:
//! - Snapshot discovery and reading (latest `animals_snapshot_*.csv`)
//! - Data quality reconciliation of status and adoption dates
//! - Dimension and fact table construction with surrogate keys
//! - Clean table output as CSV and Parquet
//! - Idempotent loading into DuckDB or PostgreSQL, tracked by a snapshot ledger

#[cfg(feature = "cli")]
pub mod cli;
pub mod database;
pub mod export;
pub mod import;
pub mod models;
pub mod pipeline;
pub mod transform;
pub mod validation;

// Re-export commonly used types
pub use database::{
    DatabaseError, DatabaseResult, Destination, DestinationConfig, DestinationStatus,
    DuckDBDestination, IncrementalLoader, LoadOutcome, LoadReport, PipelineConfig,
    SnapshotTracker,
};
#[cfg(feature = "postgres-backend")]
pub use database::PostgresDestination;
pub use export::{CleanTableWriter, ExportError, ExportResult};
pub use import::{CleanTableReader, SnapshotError, SnapshotReader, SnapshotResult};
pub use pipeline::{PipelineError, PipelineResult, TransformOptions, TransformReport};
pub use transform::{DimensionResolver, FactBuilder, KeyStrategy};
pub use validation::{DataQualityReconciler, QualityReport};

// Re-export models
pub use models::{
    AnimalRecord, Breed, CleanTable, CleanTables, Dimensions, PetType, SnapshotBatch,
    SnapshotIdentity, SnapshotLedgerEntry, SnapshotState, Shelter, TableData, TableFormat,
};
