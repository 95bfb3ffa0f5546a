//! Snapshot ledger tracking
//!
//! The `loaded_snapshots` table records every snapshot file whose tables
//! were fully applied. A row there is the only evidence a snapshot was
//! loaded; the tracker never updates or deletes rows.

use super::{DatabaseResult, Destination, LedgerInsert};
use crate::models::SnapshotLedgerEntry;

/// Append-only view of the snapshot ledger
pub struct SnapshotTracker<'a, D: Destination + ?Sized> {
    destination: &'a D,
}

impl<'a, D: Destination + ?Sized> SnapshotTracker<'a, D> {
    pub fn new(destination: &'a D) -> Self {
        Self { destination }
    }

    /// Create the ledger table if it doesn't exist
    pub async fn ensure(&self) -> DatabaseResult<()> {
        self.destination.ensure_ledger().await
    }

    /// Whether `snapshot_file` has already been applied
    pub async fn is_loaded(&self, snapshot_file: &str) -> DatabaseResult<bool> {
        self.destination.snapshot_loaded(snapshot_file).await
    }

    /// Record a fully applied snapshot
    ///
    /// Returns [`LedgerInsert::Conflict`] when another run recorded the same
    /// file first.
    pub async fn record(&self, entry: &SnapshotLedgerEntry) -> DatabaseResult<LedgerInsert> {
        let outcome = self.destination.insert_ledger_entry(entry).await?;
        match outcome {
            LedgerInsert::Inserted => tracing::info!(
                snapshot = %entry.snapshot_file,
                snapshot_date = %entry.snapshot_date,
                "Recorded snapshot in ledger"
            ),
            LedgerInsert::Conflict => tracing::warn!(
                snapshot = %entry.snapshot_file,
                "Ledger already holds snapshot"
            ),
        }
        Ok(outcome)
    }

    /// All applied snapshots, oldest first
    pub async fn entries(&self) -> DatabaseResult<Vec<SnapshotLedgerEntry>> {
        self.destination.ledger_entries().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DuckDBDestination;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_tracker_lifecycle() {
        let destination = DuckDBDestination::in_memory().unwrap();
        let tracker = SnapshotTracker::new(&destination);
        tracker.ensure().await.unwrap();
        tracker.ensure().await.unwrap();

        let first = SnapshotLedgerEntry::new(
            "animals_snapshot_20250501_000000.csv",
            NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
        );
        let second = SnapshotLedgerEntry::new(
            "animals_snapshot_20250601_000000.csv",
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        );

        assert!(!tracker.is_loaded(&first.snapshot_file).await.unwrap());
        assert_eq!(tracker.record(&first).await.unwrap(), LedgerInsert::Inserted);
        assert_eq!(tracker.record(&second).await.unwrap(), LedgerInsert::Inserted);
        assert_eq!(tracker.record(&first).await.unwrap(), LedgerInsert::Conflict);
        assert!(tracker.is_loaded(&first.snapshot_file).await.unwrap());

        let entries = tracker.entries().await.unwrap();
        let files: Vec<&str> = entries.iter().map(|e| e.snapshot_file.as_str()).collect();
        assert_eq!(files.len(), 2);
        assert!(files.contains(&"animals_snapshot_20250501_000000.csv"));
    }
}
