//! Incremental snapshot loading
//!
//! Applies one snapshot's clean tables to a destination at most once.
//! Tables are upserted parents first, each in its own committed
//! transaction, and the ledger row is written last: that insert is the
//! commit point of the whole snapshot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::tracker::SnapshotTracker;
use super::{DatabaseError, DatabaseResult, Destination, LedgerInsert};
use crate::models::{CleanTable, CleanTables, SnapshotLedgerEntry, SnapshotState, TableData};
use crate::validation::parse_date;

/// How a load ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    /// Every table was upserted and the ledger row written
    Loaded,
    /// The ledger already held this snapshot
    AlreadyLoaded,
}

/// Rows applied to one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLoad {
    pub table: CleanTable,
    /// Rows handed to the upsert after deduplication by conflict key
    pub rows: usize,
    /// True when the table was empty and not written
    pub skipped: bool,
}

/// Result of a load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub snapshot_file: String,
    pub snapshot_date: NaiveDate,
    pub outcome: LoadOutcome,
    /// Final lifecycle state
    pub state: SnapshotState,
    /// Per-table results, in load order; empty when nothing was written
    pub tables: Vec<TableLoad>,
    /// Ledger row written by this run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_entry: Option<SnapshotLedgerEntry>,
    /// Duration of the load in milliseconds
    pub duration_ms: u64,
}

impl LoadReport {
    /// Total rows upserted across all tables
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// Loads clean tables into a destination, one snapshot at a time
pub struct IncrementalLoader<D: Destination> {
    destination: D,
}

impl<D: Destination> IncrementalLoader<D> {
    /// Create a loader writing to `destination`
    pub fn new(destination: D) -> Self {
        Self { destination }
    }

    /// Get reference to the destination
    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Ledger view over the same destination
    pub fn tracker(&self) -> SnapshotTracker<'_, D> {
        SnapshotTracker::new(&self.destination)
    }

    /// Create the destination tables if they don't exist
    pub async fn initialize(&self) -> DatabaseResult<()> {
        self.destination.initialize().await
    }

    /// Apply one snapshot
    ///
    /// Validation happens before any write. If the ledger already holds the
    /// snapshot nothing is written. A failure while upserting leaves the
    /// ledger untouched, so the snapshot is retried on the next run.
    pub async fn load(&self, tables: &CleanTables) -> DatabaseResult<LoadReport> {
        let start = Instant::now();
        let mut state = SnapshotState::Transformed;

        let entry = snapshot_identity(&tables.animals)?;
        let prepared = prepare_tables(tables)?;

        let tracker = self.tracker();
        tracker.ensure().await?;

        if tracker.is_loaded(&entry.snapshot_file).await? {
            advance(&mut state, SnapshotState::AlreadyLoaded)?;
            tracing::info!(
                snapshot = %entry.snapshot_file,
                "Snapshot already loaded; nothing to do"
            );
            return Ok(LoadReport {
                snapshot_file: entry.snapshot_file,
                snapshot_date: entry.snapshot_date,
                outcome: LoadOutcome::AlreadyLoaded,
                state,
                tables: Vec::new(),
                ledger_entry: None,
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }

        advance(&mut state, SnapshotState::Loading)?;
        tracing::info!(
            snapshot = %entry.snapshot_file,
            backend = self.destination.backend_type(),
            "Loading snapshot"
        );

        let mut loads = Vec::with_capacity(prepared.len());
        for (table, data) in &prepared {
            if data.is_empty() {
                tracing::warn!(table = %table, "Table is empty; skipping upsert");
                loads.push(TableLoad {
                    table: *table,
                    rows: 0,
                    skipped: true,
                });
                continue;
            }

            let rows = self.destination.upsert(*table, data).await?;
            tracing::info!(table = %table, rows, "Upserted table");
            loads.push(TableLoad {
                table: *table,
                rows: data.row_count(),
                skipped: false,
            });
        }

        let (outcome, ledger_entry) = match tracker.record(&entry).await? {
            LedgerInsert::Inserted => {
                advance(&mut state, SnapshotState::Loaded)?;
                (LoadOutcome::Loaded, Some(entry.clone()))
            }
            LedgerInsert::Conflict => {
                advance(&mut state, SnapshotState::AlreadyLoaded)?;
                tracing::warn!(
                    snapshot = %entry.snapshot_file,
                    "Lost ledger race to a concurrent load; treating as already loaded"
                );
                (LoadOutcome::AlreadyLoaded, None)
            }
        };

        Ok(LoadReport {
            snapshot_file: entry.snapshot_file,
            snapshot_date: entry.snapshot_date,
            outcome,
            state,
            tables: loads,
            ledger_entry,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn advance(state: &mut SnapshotState, next: SnapshotState) -> DatabaseResult<()> {
    if !state.can_transition_to(next) {
        return Err(DatabaseError::InvalidInput(format!(
            "Invalid snapshot state transition {} -> {}",
            state, next
        )));
    }
    tracing::debug!(from = %state, to = %next, "Snapshot state");
    *state = next;
    Ok(())
}

/// Project every table to its layout and drop duplicate conflict keys
fn prepare_tables(tables: &CleanTables) -> DatabaseResult<Vec<(CleanTable, TableData)>> {
    CleanTable::LOAD_ORDER
        .iter()
        .map(|table| {
            let data = tables.get(*table).project(*table).map_err(|missing| {
                DatabaseError::InvalidInput(format!(
                    "Table {} is missing columns {:?}",
                    table, missing
                ))
            })?;
            let deduped = data.dedup_last_by(table.conflict_key());
            if deduped.row_count() != data.row_count() {
                tracing::warn!(
                    table = %table,
                    duplicates = data.row_count() - deduped.row_count(),
                    "Duplicate keys in table; keeping the last row for each"
                );
            }
            Ok((*table, deduped))
        })
        .collect()
}

/// The single (snapshot_file, snapshot_date) pair of the fact table
fn snapshot_identity(animals: &TableData) -> DatabaseResult<SnapshotLedgerEntry> {
    let file = single_value(animals, "snapshot_file")?;
    let date_text = single_value(animals, "snapshot_date")?;
    let date = parse_date(date_text).ok_or_else(|| {
        DatabaseError::InvalidInput(format!("Invalid snapshot_date '{}'", date_text))
    })?;
    Ok(SnapshotLedgerEntry::new(file, date))
}

fn single_value<'a>(data: &'a TableData, column: &str) -> DatabaseResult<&'a str> {
    if data.column(column).is_none() {
        return Err(DatabaseError::AmbiguousBatch(format!(
            "animals table has no {} column",
            column
        )));
    }
    match data.distinct_non_null(column).as_slice() {
        [only] => Ok(*only),
        [] => Err(DatabaseError::AmbiguousBatch(format!(
            "animals table has no {} value",
            column
        ))),
        many => Err(DatabaseError::AmbiguousBatch(format!(
            "animals table has {} distinct {} values: {:?}",
            many.len(),
            column,
            many
        ))),
    }
}
