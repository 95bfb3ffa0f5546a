//! Snapshot ledger models
//!
//! The ledger (`loaded_snapshots`) is append-only. A row exists for a
//! snapshot file only once every table of that snapshot has been committed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One applied snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLedgerEntry {
    /// Unique snapshot file name
    pub snapshot_file: String,
    /// Date the snapshot was taken
    pub snapshot_date: NaiveDate,
    /// When the ledger row was written (assigned by the destination)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
}

impl SnapshotLedgerEntry {
    /// Create an entry that has not been written yet
    pub fn new(snapshot_file: impl Into<String>, snapshot_date: NaiveDate) -> Self {
        Self {
            snapshot_file: snapshot_file.into(),
            snapshot_date,
            loaded_at: None,
        }
    }
}

/// Lifecycle of one snapshot application
///
/// ```text
/// New -> Validated -> Transformed -> AlreadyLoaded
///                                 \-> Loading -> Loaded
/// ```
///
/// `Loading -> AlreadyLoaded` covers a run that lost the ledger insert to a
/// concurrent run of the same snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotState {
    /// Nothing has been read yet
    New,
    /// The reader accepted the batch
    Validated,
    /// Reconcile, resolve and build are done
    Transformed,
    /// Ledger already holds the snapshot; terminal
    AlreadyLoaded,
    /// Tables are being upserted
    Loading,
    /// Ledger row committed; terminal
    Loaded,
}

impl SnapshotState {
    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(self, next: SnapshotState) -> bool {
        use SnapshotState::*;
        matches!(
            (self, next),
            (New, Validated)
                | (Validated, Transformed)
                | (Transformed, AlreadyLoaded)
                | (Transformed, Loading)
                | (Loading, Loaded)
                | (Loading, AlreadyLoaded)
        )
    }

    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, SnapshotState::AlreadyLoaded | SnapshotState::Loaded)
    }
}

impl std::fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SnapshotState::New => "new",
            SnapshotState::Validated => "validated",
            SnapshotState::Transformed => "transformed",
            SnapshotState::AlreadyLoaded => "already_loaded",
            SnapshotState::Loading => "loading",
            SnapshotState::Loaded => "loaded",
        };
        write!(f, "{}", name)
    }
}
