//! Validation functionality
//!
//! Provides data quality reconciliation for raw snapshot rows:
//! - Text normalization (trimming, title-casing)
//! - Lenient date and age parsing
//! - Status / adopted-date consistency rules

pub mod quality;

pub use quality::{
    DataQualityReconciler, QualityReport, ReconciledRecord, STATUS_ADOPTED, clean_text,
    parse_age, parse_date, title_case,
};
