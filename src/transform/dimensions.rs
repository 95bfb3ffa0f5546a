//! Dimension resolution
//!
//! Builds the type, breed and shelter dimensions from a reconciled batch.
//! Values are deduplicated and sorted before keys are assigned, so the
//! structure of the output depends only on the input values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::models::{Breed, Dimensions, PetType, Shelter};
use crate::validation::ReconciledRecord;

/// Namespace for deterministic dimension keys
const DIMENSION_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_9b37_4d52_8e0a_51c3_d7f9_a2b4);

/// Separator between natural-key components; never appears in trimmed text
const KEY_SEPARATOR: char = '\u{1f}';

/// How surrogate keys are generated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    /// Fresh random key for every row of every run
    #[default]
    Random,
    /// Name-based key: the same natural key yields the same id on every run
    Deterministic,
}

impl KeyStrategy {
    fn key(self, natural_key: &str) -> Uuid {
        match self {
            KeyStrategy::Random => Uuid::new_v4(),
            KeyStrategy::Deterministic => {
                Uuid::new_v5(&DIMENSION_NAMESPACE, natural_key.as_bytes())
            }
        }
    }
}

impl std::str::FromStr for KeyStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" => Ok(KeyStrategy::Random),
            "deterministic" => Ok(KeyStrategy::Deterministic),
            _ => Err(format!(
                "Unknown key strategy: {}. Use 'random' or 'deterministic'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for KeyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyStrategy::Random => write!(f, "random"),
            KeyStrategy::Deterministic => write!(f, "deterministic"),
        }
    }
}

/// Derives deduplicated dimension tables with surrogate keys
#[derive(Debug, Default)]
pub struct DimensionResolver {
    strategy: KeyStrategy,
}

impl DimensionResolver {
    /// Create a resolver using `strategy` for key generation
    pub fn new(strategy: KeyStrategy) -> Self {
        Self { strategy }
    }

    /// The key strategy in use
    pub fn strategy(&self) -> KeyStrategy {
        self.strategy
    }

    /// Build all three dimensions from one batch
    pub fn resolve(&self, records: &[ReconciledRecord]) -> Dimensions {
        let pet_types = self.resolve_types(records);
        let breeds = self.resolve_breeds(records, &pet_types);
        let shelters = self.resolve_shelters(records);

        tracing::info!(
            types = pet_types.len(),
            breeds = breeds.len(),
            shelters = shelters.len(),
            strategy = %self.strategy,
            "Resolved dimensions"
        );

        Dimensions {
            pet_types,
            breeds,
            shelters,
        }
    }

    /// Distinct non-null type names, sorted
    pub fn resolve_types(&self, records: &[ReconciledRecord]) -> Vec<PetType> {
        let names: BTreeSet<&str> = records
            .iter()
            .filter_map(|r| r.type_name.as_deref())
            .collect();

        names
            .into_iter()
            .map(|name| PetType {
                type_id: self.strategy.key(&format!("pet_type:{}", name)),
                type_name: name.to_string(),
            })
            .collect()
    }

    /// Distinct (type, breed) pairs with both parts present, sorted
    ///
    /// The type key is looked up by name in `pet_types`; a type that is not
    /// there leaves the breed with a null type key.
    pub fn resolve_breeds(
        &self,
        records: &[ReconciledRecord],
        pet_types: &[PetType],
    ) -> Vec<Breed> {
        let pairs: BTreeSet<(&str, &str)> = records
            .iter()
            .filter_map(|r| Some((r.type_name.as_deref()?, r.breed.as_deref()?)))
            .collect();

        pairs
            .into_iter()
            .map(|(type_name, breed)| {
                let type_id = pet_types
                    .iter()
                    .find(|t| t.type_name == type_name)
                    .map(|t| t.type_id);
                if type_id.is_none() {
                    tracing::warn!(breed, type_name, "Breed type not found in type dimension");
                }
                Breed {
                    breed_id: self.strategy.key(&format!(
                        "breed:{}{}{}",
                        type_name, KEY_SEPARATOR, breed
                    )),
                    breed: breed.to_string(),
                    type_id,
                }
            })
            .collect()
    }

    /// Distinct (name, city, state) tuples, sorted; null parts take part in the tuple
    pub fn resolve_shelters(&self, records: &[ReconciledRecord]) -> Vec<Shelter> {
        let tuples: BTreeSet<(Option<&str>, Option<&str>, Option<&str>)> = records
            .iter()
            .map(|r| {
                (
                    r.shelter_name.as_deref(),
                    r.city.as_deref(),
                    r.state.as_deref(),
                )
            })
            .collect();

        tuples
            .into_iter()
            .map(|(name, city, state)| Shelter {
                shelter_id: self.strategy.key(&shelter_natural_key(name, city, state)),
                shelter_name: name.map(str::to_string),
                city: city.map(str::to_string),
                state: state.map(str::to_string),
            })
            .collect()
    }
}

/// Natural key for a shelter; a null part is distinct from an empty string
fn shelter_natural_key(name: Option<&str>, city: Option<&str>, state: Option<&str>) -> String {
    let part = |value: Option<&str>| match value {
        Some(v) => format!("={}", v),
        None => "~".to_string(),
    };
    format!(
        "shelter:{}{}{}{}{}",
        part(name),
        KEY_SEPARATOR,
        part(city),
        KEY_SEPARATOR,
        part(state)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn record(
        type_name: Option<&str>,
        breed: Option<&str>,
        shelter: (&str, &str, &str),
    ) -> ReconciledRecord {
        ReconciledRecord {
            pet_id: Some("p".to_string()),
            name: None,
            age: None,
            gender: None,
            size: None,
            status: None,
            date_arrived: None,
            adopted_date: None,
            type_name: type_name.map(str::to_string),
            breed: breed.map(str::to_string),
            shelter_name: Some(shelter.0.to_string()),
            city: Some(shelter.1.to_string()),
            state: Some(shelter.2.to_string()),
            snapshot_date: None,
        }
    }

    fn sample() -> Vec<ReconciledRecord> {
        vec![
            record(Some("Dog"), Some("Beagle"), ("A", "Austin", "TX")),
            record(Some("Cat"), Some("Siamese"), ("B", "Boston", "MA")),
            record(Some("Dog"), Some("Beagle"), ("A", "Austin", "TX")),
            record(Some("Dog"), Some("Poodle"), ("A", "Dallas", "TX")),
            record(None, Some("Mystery"), ("A", "Austin", "TX")),
        ]
    }

    #[test]
    fn test_types_are_distinct_and_sorted() {
        let dims = DimensionResolver::default().resolve(&sample());
        let names: Vec<&str> = dims.pet_types.iter().map(|t| t.type_name.as_str()).collect();
        assert_eq!(names, vec!["Cat", "Dog"]);
    }

    #[test]
    fn test_breeds_reference_types_of_same_run() {
        let dims = DimensionResolver::default().resolve(&sample());
        assert_eq!(dims.breeds.len(), 3);
        for breed in &dims.breeds {
            let type_id = breed.type_id.expect("breed should have a type");
            assert!(dims.pet_types.iter().any(|t| t.type_id == type_id));
        }
        let dog = dims
            .pet_types
            .iter()
            .find(|t| t.type_name == "Dog")
            .map(|t| t.type_id)
            .unwrap();
        let poodle = dims.breeds.iter().find(|b| b.breed == "Poodle").unwrap();
        assert_eq!(poodle.type_id, Some(dog));
    }

    #[test]
    fn test_breed_without_known_type_gets_null_key() {
        let records = vec![record(Some("Bird"), Some("Parrot"), ("A", "Austin", "TX"))];
        let breeds = DimensionResolver::default().resolve_breeds(&records, &[]);
        assert_eq!(breeds.len(), 1);
        assert!(breeds[0].type_id.is_none());
    }

    #[test]
    fn test_shelters_distinct_by_full_tuple() {
        let dims = DimensionResolver::default().resolve(&sample());
        // ("A", Austin), ("A", Dallas), ("B", Boston)
        assert_eq!(dims.shelters.len(), 3);
    }

    #[test]
    fn test_random_keys_differ_between_runs() {
        let resolver = DimensionResolver::new(KeyStrategy::Random);
        let first = resolver.resolve(&sample());
        let second = resolver.resolve(&sample());
        assert_eq!(first.pet_types.len(), second.pet_types.len());
        assert_ne!(first.pet_types[0].type_id, second.pet_types[0].type_id);
    }

    #[test]
    fn test_deterministic_keys_repeat_between_runs() {
        let resolver = DimensionResolver::new(KeyStrategy::Deterministic);
        let first = resolver.resolve(&sample());
        let second = resolver.resolve(&sample());
        assert_eq!(first, second);
    }

    #[test]
    fn test_null_shelter_part_is_not_empty_string() {
        assert_ne!(
            shelter_natural_key(Some("A"), None, Some("TX")),
            shelter_natural_key(Some("A"), Some(""), Some("TX"))
        );
    }

    #[test]
    fn test_key_strategy_from_str() {
        assert_eq!(KeyStrategy::from_str("Deterministic").unwrap(), KeyStrategy::Deterministic);
        assert_eq!(KeyStrategy::from_str("random").unwrap(), KeyStrategy::Random);
        assert!(KeyStrategy::from_str("sequential").is_err());
    }
}
