//! Data quality reconciliation
//!
//! Normalizes a raw snapshot batch and repairs status/adopted-date
//! conflicts. This step never rejects a batch: every problem it finds is
//! either corrected or nulled out, and counted in a [`QualityReport`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::{RawAnimalRecord, SnapshotBatch};

/// Canonical adopted status after title-casing
pub const STATUS_ADOPTED: &str = "Adopted";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// A snapshot row after normalization and reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledRecord {
    pub pet_id: Option<String>,
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub size: Option<String>,
    pub status: Option<String>,
    pub date_arrived: Option<NaiveDate>,
    pub adopted_date: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub breed: Option<String>,
    pub shelter_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub snapshot_date: Option<NaiveDate>,
}

/// Counts of everything the reconciler changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Rows processed
    pub rows: usize,
    /// Rows with an adopted date whose status was forced to "Adopted"
    pub status_forced_adopted: usize,
    /// "Adopted" rows whose missing adopted date was filled from the snapshot date
    pub adopted_date_backfilled: usize,
    /// Non-empty date values that could not be parsed and became null
    pub unparsable_dates: usize,
    /// Non-empty age values that were not integers and became null
    pub unparsable_ages: usize,
}

impl QualityReport {
    /// Total corrections applied by the two reconciliation rules
    pub fn corrections(&self) -> usize {
        self.status_forced_adopted + self.adopted_date_backfilled
    }
}

/// Normalizes and repairs raw snapshot rows
#[derive(Debug, Default)]
pub struct DataQualityReconciler;

impl DataQualityReconciler {
    /// Create a new reconciler
    pub fn new() -> Self {
        Self
    }

    /// Reconcile a whole batch
    ///
    /// Rows whose own `snapshot_date` is missing inherit the batch date, so
    /// the backfill rule has a date to use for every row.
    pub fn reconcile(&self, batch: &SnapshotBatch) -> (Vec<ReconciledRecord>, QualityReport) {
        let mut report = QualityReport {
            rows: batch.records.len(),
            ..Default::default()
        };

        let records = batch
            .records
            .iter()
            .map(|raw| {
                let mut record = self.normalize(raw, &mut report);
                if record.snapshot_date.is_none() {
                    record.snapshot_date = Some(batch.identity.snapshot_date);
                }
                self.apply_rules(&mut record, &mut report);
                record
            })
            .collect();

        if report.status_forced_adopted > 0 {
            tracing::warn!(
                rows = report.status_forced_adopted,
                "Data quality: rows had adopted_date but status != 'Adopted'; status set to 'Adopted'"
            );
        }
        if report.adopted_date_backfilled > 0 {
            tracing::warn!(
                rows = report.adopted_date_backfilled,
                "Data quality: rows had status 'Adopted' but no adopted_date; filled from snapshot_date"
            );
        }
        if report.unparsable_dates > 0 || report.unparsable_ages > 0 {
            tracing::warn!(
                dates = report.unparsable_dates,
                ages = report.unparsable_ages,
                "Data quality: unparsable values replaced with null"
            );
        }

        (records, report)
    }

    /// Normalize one row: parse dates and age, trim and case text
    pub fn normalize(&self, raw: &RawAnimalRecord, report: &mut QualityReport) -> ReconciledRecord {
        let mut date = |value: &Option<String>| {
            let text = clean_text(value.as_deref());
            let parsed = text.as_deref().and_then(parse_date);
            if text.is_some() && parsed.is_none() {
                report.unparsable_dates += 1;
            }
            parsed
        };

        let date_arrived = date(&raw.date_arrived);
        let adopted_date = date(&raw.adopted_date);
        let snapshot_date = date(&raw.snapshot_date);

        let age_text = clean_text(raw.age.as_deref());
        let age = age_text.as_deref().and_then(parse_age);
        if age_text.is_some() && age.is_none() {
            report.unparsable_ages += 1;
        }

        ReconciledRecord {
            pet_id: clean_text(raw.pet_id.as_deref()),
            name: clean_text(raw.name.as_deref()),
            age,
            gender: clean_text(raw.gender.as_deref()),
            size: clean_text(raw.size.as_deref()),
            status: clean_text(raw.status.as_deref()).map(|s| title_case(&s)),
            date_arrived,
            adopted_date,
            type_name: clean_text(raw.type_name.as_deref()).map(|s| title_case(&s)),
            breed: clean_text(raw.breed.as_deref()),
            shelter_name: clean_text(raw.shelter_name.as_deref()),
            city: clean_text(raw.city.as_deref()),
            state: clean_text(raw.state.as_deref()),
            snapshot_date,
        }
    }

    /// Apply the two reconciliation rules, in order
    ///
    /// Rule 1 runs first because it changes the status that rule 2 inspects.
    pub fn apply_rules(&self, record: &mut ReconciledRecord, report: &mut QualityReport) {
        // 1. an adopted date implies the animal is adopted
        if record.adopted_date.is_some() && record.status.as_deref() != Some(STATUS_ADOPTED) {
            record.status = Some(STATUS_ADOPTED.to_string());
            report.status_forced_adopted += 1;
        }

        // 2. adopted without a date: the snapshot is the latest date we know it held
        if record.status.as_deref() == Some(STATUS_ADOPTED) && record.adopted_date.is_none() {
            record.adopted_date = record.snapshot_date;
            report.adopted_date_backfilled += 1;
        }
    }
}

/// Trim a text value; empty after trimming becomes `None`
pub fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Title-case a string: the first letter of every alphabetic run is
/// upper-cased and the rest of the run lower-cased.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_word = false;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}

/// Parse a calendar date leniently; anything unrecognized is `None`
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Some(datetime.date());
        }
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Parse an age; integral floats ("4.0") are accepted, anything else is `None`
pub fn parse_age(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(age) = value.parse::<i64>() {
        return Some(age);
    }
    value
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        .map(|f| f as i64)
}
