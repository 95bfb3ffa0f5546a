//! Animal fact model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of the `animals` fact table
///
/// `pet_id` is the natural key the loader upserts on. The three dimension
/// keys are `None` when the record failed to join the matching dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimalRecord {
    /// Stable natural key
    pub pet_id: String,
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub size: Option<String>,
    /// Reconciled adoption status
    pub status: Option<String>,
    pub date_arrived: Option<NaiveDate>,
    pub adopted_date: Option<NaiveDate>,
    pub type_id: Option<Uuid>,
    pub breed_id: Option<Uuid>,
    pub shelter_id: Option<Uuid>,
    pub snapshot_date: Option<NaiveDate>,
    /// Base name of the snapshot this row was built from
    pub snapshot_file: String,
}
