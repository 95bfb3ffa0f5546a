//! Models module
//!
//! Defines the raw snapshot rows, the dimension and fact tables built from
//! them, the snapshot ledger, and the column-wise clean table layouts that
//! move between the transform and the loader.

pub mod animal;
pub mod dimensions;
pub mod ledger;
pub mod snapshot;
pub mod tables;

pub use animal::AnimalRecord;
pub use dimensions::{Breed, Dimensions, PetType, Shelter};
pub use ledger::{SnapshotLedgerEntry, SnapshotState};
pub use snapshot::{
    REQUIRED_COLUMNS, RawAnimalRecord, SNAPSHOT_FILE_PATTERN, SnapshotBatch, SnapshotIdentity,
};
pub use tables::{
    CleanTable, CleanTables, ColumnData, ColumnDef, ColumnKind, TableData, TableFormat,
};
