//! Dimension table models
//!
//! Dimension rows are rebuilt from each batch; their identifiers reference
//! each other only within the same transform run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Animal type dimension row (`pet_types`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetType {
    /// Surrogate key
    pub type_id: Uuid,
    /// Title-cased type name, e.g. "Dog"
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Breed dimension row (`breeds`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breed {
    /// Surrogate key
    pub breed_id: Uuid,
    /// Breed name as trimmed from the snapshot
    pub breed: String,
    /// Owning type; `None` when the type was not present in the type dimension
    pub type_id: Option<Uuid>,
}

/// Shelter dimension row (`shelters`)
///
/// Identity is the full (name, city, state) tuple, so two shelters sharing a
/// name in different cities are distinct rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shelter {
    /// Surrogate key
    pub shelter_id: Uuid,
    pub shelter_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

/// The three dimension tables produced by one transform run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub pet_types: Vec<PetType>,
    pub breeds: Vec<Breed>,
    pub shelters: Vec<Shelter>,
}
