//! Transform and load orchestration
//!
//! `transform` runs Reader -> Reconciler -> Resolver -> Fact Builder ->
//! Writer for one snapshot; `load` reads the clean tables back and applies
//! them through the [`IncrementalLoader`]; `run` does both.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::database::{
    DatabaseError, Destination, IncrementalLoader, LoadReport, PipelineConfig,
};
use crate::export::{CleanTableWriter, ExportError};
use crate::import::{CleanTableReader, SnapshotError, SnapshotReader};
use crate::models::{CleanTable, CleanTables, TableData, TableFormat};
use crate::transform::{DimensionResolver, FactBuilder, FactReport, KeyStrategy};
use crate::validation::{DataQualityReconciler, QualityReport};

/// Error from any pipeline stage
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Inputs of one transform run
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Directory searched for the latest snapshot
    pub raw_dir: PathBuf,
    /// Directory the clean tables are written to
    pub clean_dir: PathBuf,
    /// Explicit snapshot to process instead of the latest
    pub snapshot: Option<PathBuf>,
    pub key_strategy: KeyStrategy,
}

impl TransformOptions {
    /// Options taken from a loaded configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            raw_dir: config.paths.raw_dir.clone(),
            clean_dir: config.paths.clean_dir.clone(),
            snapshot: None,
            key_strategy: config.transform.key_strategy,
        }
    }

    /// Process `snapshot` instead of the latest file
    pub fn with_snapshot(mut self, snapshot: Option<PathBuf>) -> Self {
        self.snapshot = snapshot;
        self
    }
}

/// Rows written to one clean table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCount {
    pub table: CleanTable,
    pub rows: usize,
}

/// Result of a transform run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformReport {
    pub snapshot_file: String,
    pub snapshot_date: NaiveDate,
    pub source_path: PathBuf,
    pub key_strategy: KeyStrategy,
    pub quality: QualityReport,
    pub facts: FactReport,
    pub tables: Vec<TableCount>,
    /// Every file written to the clean directory
    pub outputs: Vec<PathBuf>,
}

/// Transform report plus the tables it wrote
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub report: TransformReport,
    pub tables: CleanTables,
}

/// Build and persist the clean tables of one snapshot
///
/// Nothing is written to the clean directory unless every stage succeeds.
pub fn transform(options: &TransformOptions) -> PipelineResult<TransformOutput> {
    let batch = SnapshotReader::new(&options.raw_dir).read(options.snapshot.as_deref())?;

    let (records, quality) = DataQualityReconciler::new().reconcile(&batch);
    let dimensions = DimensionResolver::new(options.key_strategy).resolve(&records);
    let (facts, fact_report) = FactBuilder::new().build(&records, &dimensions, &batch.identity);

    let tables = CleanTables {
        pet_types: TableData::from_pet_types(&dimensions.pet_types),
        breeds: TableData::from_breeds(&dimensions.breeds),
        shelters: TableData::from_shelters(&dimensions.shelters),
        animals: TableData::from_animals(&facts),
    };

    let outputs = CleanTableWriter::new(&options.clean_dir).write_all(&tables)?;

    let counts = CleanTable::LOAD_ORDER
        .iter()
        .map(|table| TableCount {
            table: *table,
            rows: tables.get(*table).row_count(),
        })
        .collect();

    tracing::info!(
        snapshot = %batch.identity.snapshot_file,
        rows = batch.len(),
        corrections = quality.corrections(),
        unresolved_keys = fact_report.unresolved_total(),
        "Transform complete"
    );

    Ok(TransformOutput {
        report: TransformReport {
            snapshot_file: batch.identity.snapshot_file.clone(),
            snapshot_date: batch.identity.snapshot_date,
            source_path: batch.source_path.clone(),
            key_strategy: options.key_strategy,
            quality,
            facts: fact_report,
            tables: counts,
            outputs,
        },
        tables,
    })
}

/// Read the clean tables from `clean_dir` and apply them to `destination`
pub async fn load<D: Destination>(
    clean_dir: impl Into<PathBuf>,
    format: TableFormat,
    destination: D,
) -> PipelineResult<LoadReport> {
    let reader = CleanTableReader::new(clean_dir, format);
    tracing::info!(dir = %reader.clean_dir().display(), %format, "Reading clean tables");
    let tables = reader.read_all()?;

    let loader = IncrementalLoader::new(destination);
    Ok(loader.load(&tables).await?)
}

/// Transform one snapshot, then load the files it wrote
pub async fn run<D: Destination>(
    options: &TransformOptions,
    format: TableFormat,
    destination: D,
) -> PipelineResult<(TransformReport, LoadReport)> {
    let output = transform(options)?;
    let load_report = load(&options.clean_dir, format, destination).await?;
    Ok((output.report, load_report))
}
