//! Fact table construction
//!
//! Left-joins reconciled records to the dimensions of the same run. A record
//! whose join fails keeps a null key and is reported, never dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{AnimalRecord, Dimensions, SnapshotIdentity};
use crate::validation::ReconciledRecord;

/// Maximum number of unresolved-key samples kept in a report
pub const MAX_SAMPLES: usize = 100;

/// Foreign key column of the fact table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKey {
    TypeId,
    BreedId,
    ShelterId,
}

impl std::fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForeignKey::TypeId => write!(f, "type_id"),
            ForeignKey::BreedId => write!(f, "breed_id"),
            ForeignKey::ShelterId => write!(f, "shelter_id"),
        }
    }
}

/// One fact row whose dimension join found no match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedForeignKey {
    pub pet_id: String,
    pub key: ForeignKey,
}

/// Findings from building the fact table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactReport {
    /// Fact rows produced
    pub rows: usize,
    /// Records dropped because they had no `pet_id`
    pub skipped_without_pet_id: usize,
    pub unresolved_type_id: usize,
    pub unresolved_breed_id: usize,
    pub unresolved_shelter_id: usize,
    /// First findings, capped at [`MAX_SAMPLES`]
    pub samples: Vec<UnresolvedForeignKey>,
}

impl FactReport {
    /// Total null foreign keys across all rows
    pub fn unresolved_total(&self) -> usize {
        self.unresolved_type_id + self.unresolved_breed_id + self.unresolved_shelter_id
    }

    fn record(&mut self, pet_id: &str, key: ForeignKey) {
        match key {
            ForeignKey::TypeId => self.unresolved_type_id += 1,
            ForeignKey::BreedId => self.unresolved_breed_id += 1,
            ForeignKey::ShelterId => self.unresolved_shelter_id += 1,
        }
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(UnresolvedForeignKey {
                pet_id: pet_id.to_string(),
                key,
            });
        }
    }
}

type ShelterKey<'a> = (Option<&'a str>, Option<&'a str>, Option<&'a str>);

/// Join indexes over one run's dimensions
struct DimensionIndex<'a> {
    types: HashMap<&'a str, Uuid>,
    breeds: HashMap<(&'a str, Option<Uuid>), Uuid>,
    shelters: HashMap<ShelterKey<'a>, Uuid>,
}

impl<'a> DimensionIndex<'a> {
    fn new(dimensions: &'a Dimensions) -> Self {
        Self {
            types: dimensions
                .pet_types
                .iter()
                .map(|t| (t.type_name.as_str(), t.type_id))
                .collect(),
            breeds: dimensions
                .breeds
                .iter()
                .map(|b| ((b.breed.as_str(), b.type_id), b.breed_id))
                .collect(),
            shelters: dimensions
                .shelters
                .iter()
                .map(|s| {
                    (
                        (
                            s.shelter_name.as_deref(),
                            s.city.as_deref(),
                            s.state.as_deref(),
                        ),
                        s.shelter_id,
                    )
                })
                .collect(),
        }
    }
}

/// Builds the `animals` fact table
#[derive(Debug, Default)]
pub struct FactBuilder;

impl FactBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Join `records` to `dimensions` and stamp `identity` on every row
    ///
    /// The breed join uses the resolved type key, so a breed under an
    /// unresolved type only matches a breed row that also has a null type.
    pub fn build(
        &self,
        records: &[ReconciledRecord],
        dimensions: &Dimensions,
        identity: &SnapshotIdentity,
    ) -> (Vec<AnimalRecord>, FactReport) {
        let index = DimensionIndex::new(dimensions);
        let mut report = FactReport::default();
        let mut facts = Vec::with_capacity(records.len());

        for record in records {
            let Some(pet_id) = record.pet_id.clone() else {
                report.skipped_without_pet_id += 1;
                continue;
            };

            let type_id = record
                .type_name
                .as_deref()
                .and_then(|name| index.types.get(name).copied());
            let breed_id = record
                .breed
                .as_deref()
                .and_then(|breed| index.breeds.get(&(breed, type_id)).copied());
            let shelter_id = index
                .shelters
                .get(&(
                    record.shelter_name.as_deref(),
                    record.city.as_deref(),
                    record.state.as_deref(),
                ))
                .copied();

            if type_id.is_none() {
                report.record(&pet_id, ForeignKey::TypeId);
            }
            if breed_id.is_none() {
                report.record(&pet_id, ForeignKey::BreedId);
            }
            if shelter_id.is_none() {
                report.record(&pet_id, ForeignKey::ShelterId);
            }

            facts.push(AnimalRecord {
                pet_id,
                name: record.name.clone(),
                age: record.age,
                gender: record.gender.clone(),
                size: record.size.clone(),
                status: record.status.clone(),
                date_arrived: record.date_arrived,
                adopted_date: record.adopted_date,
                type_id,
                breed_id,
                shelter_id,
                snapshot_date: record.snapshot_date,
                snapshot_file: identity.snapshot_file.clone(),
            });
        }

        report.rows = facts.len();

        if report.skipped_without_pet_id > 0 {
            tracing::warn!(
                rows = report.skipped_without_pet_id,
                "Skipped records without pet_id"
            );
        }
        if report.unresolved_total() > 0 {
            tracing::warn!(
                type_id = report.unresolved_type_id,
                breed_id = report.unresolved_breed_id,
                shelter_id = report.unresolved_shelter_id,
                "Unresolved foreign keys persisted as null"
            );
        }
        tracing::info!(rows = report.rows, snapshot = %identity.snapshot_file, "Built fact table");

        (facts, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::DimensionResolver;
    use chrono::NaiveDate;

    fn record(
        pet_id: Option<&str>,
        type_name: Option<&str>,
        breed: Option<&str>,
        shelter: &str,
    ) -> ReconciledRecord {
        ReconciledRecord {
            pet_id: pet_id.map(str::to_string),
            name: Some("Name".to_string()),
            age: Some(2),
            gender: Some("Male".to_string()),
            size: Some("Small".to_string()),
            status: Some("Available".to_string()),
            date_arrived: NaiveDate::from_ymd_opt(2025, 5, 1),
            adopted_date: None,
            type_name: type_name.map(str::to_string),
            breed: breed.map(str::to_string),
            shelter_name: Some(shelter.to_string()),
            city: Some("Austin".to_string()),
            state: Some("TX".to_string()),
            snapshot_date: NaiveDate::from_ymd_opt(2025, 6, 1),
        }
    }

    fn identity() -> SnapshotIdentity {
        SnapshotIdentity::new(
            "animals_snapshot_20250601_000000.csv",
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        )
    }

    #[test]
    fn test_facts_resolve_all_keys() {
        let records = vec![
            record(Some("p1"), Some("Dog"), Some("Beagle"), "A"),
            record(Some("p2"), Some("Cat"), Some("Siamese"), "B"),
            record(Some("p3"), Some("Dog"), Some("Poodle"), "A"),
        ];
        let dims = DimensionResolver::default().resolve(&records);
        let (facts, report) = FactBuilder::new().build(&records, &dims, &identity());

        assert_eq!(facts.len(), 3);
        assert_eq!(report.unresolved_total(), 0);
        for fact in &facts {
            let breed_id = fact.breed_id.unwrap();
            let shelter_id = fact.shelter_id.unwrap();
            assert!(fact.type_id.is_some());
            assert!(dims.breeds.iter().any(|b| b.breed_id == breed_id));
            assert!(dims.shelters.iter().any(|s| s.shelter_id == shelter_id));
            assert_eq!(fact.snapshot_file, "animals_snapshot_20250601_000000.csv");
        }
        assert_eq!(facts[0].shelter_id, facts[2].shelter_id);
    }

    #[test]
    fn test_unresolved_keys_are_kept_and_reported() {
        let records = vec![record(Some("p1"), None, Some("Beagle"), "A")];
        let dims = DimensionResolver::default().resolve(&records);
        let (facts, report) = FactBuilder::new().build(&records, &dims, &identity());

        assert_eq!(facts.len(), 1);
        assert!(facts[0].type_id.is_none());
        assert!(facts[0].breed_id.is_none());
        assert!(facts[0].shelter_id.is_some());
        assert_eq!(report.unresolved_type_id, 1);
        assert_eq!(report.unresolved_breed_id, 1);
        assert_eq!(report.samples.len(), 2);
        assert_eq!(report.samples[0].key, ForeignKey::TypeId);
    }

    #[test]
    fn test_record_without_pet_id_is_skipped() {
        let records = vec![
            record(None, Some("Dog"), Some("Beagle"), "A"),
            record(Some("p2"), Some("Dog"), Some("Beagle"), "A"),
        ];
        let dims = DimensionResolver::default().resolve(&records);
        let (facts, report) = FactBuilder::new().build(&records, &dims, &identity());
        assert_eq!(facts.len(), 1);
        assert_eq!(report.skipped_without_pet_id, 1);
        assert_eq!(report.rows, 1);
    }
}
