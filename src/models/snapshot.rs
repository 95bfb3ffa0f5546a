//! Raw snapshot models
//!
//! A snapshot is one full extract of the shelter dataset, identified by the
//! file it was read from and the single date it was taken on.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Columns every raw snapshot must carry.
pub const REQUIRED_COLUMNS: [&str; 14] = [
    "pet_id",
    "name",
    "age",
    "gender",
    "size",
    "status",
    "date_arrived",
    "adopted_date",
    "type",
    "breed",
    "shelter_name",
    "city",
    "state",
    "snapshot_date",
];

/// File name pattern for raw snapshots inside the raw directory
pub const SNAPSHOT_FILE_PATTERN: &str = "animals_snapshot_*.csv";

/// One raw snapshot row, every field exactly as read (no coercion yet).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAnimalRecord {
    pub pet_id: Option<String>,
    pub name: Option<String>,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub size: Option<String>,
    pub status: Option<String>,
    pub date_arrived: Option<String>,
    pub adopted_date: Option<String>,
    /// Animal type (`type` column)
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub breed: Option<String>,
    pub shelter_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub snapshot_date: Option<String>,
}

/// Identity of a snapshot batch
///
/// `snapshot_file` is the idempotency key the loader records in the ledger,
/// so it is carried through every serialization unaltered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotIdentity {
    /// Base name of the raw snapshot file
    pub snapshot_file: String,
    /// The one date shared by every row of the batch
    pub snapshot_date: NaiveDate,
}

impl SnapshotIdentity {
    pub fn new(snapshot_file: impl Into<String>, snapshot_date: NaiveDate) -> Self {
        Self {
            snapshot_file: snapshot_file.into(),
            snapshot_date,
        }
    }
}

/// A fully loaded, validated raw batch
#[derive(Debug, Clone)]
pub struct SnapshotBatch {
    /// Path the batch was read from
    pub source_path: PathBuf,
    /// File name and date of the batch
    pub identity: SnapshotIdentity,
    /// Every row of the batch, in file order
    pub records: Vec<RawAnimalRecord>,
}

impl SnapshotBatch {
    /// Number of raw rows in the batch
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch has no rows
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
