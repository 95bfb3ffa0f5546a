//! Transform CLI command
//!
//! Builds the clean tables of one snapshot and writes them to the clean
//! directory.

use std::path::PathBuf;

use crate::cli::commands::{load_config, print_json};
use crate::cli::error::CliError;
use crate::database::PipelineConfig;
use crate::pipeline::{self, TransformOptions, TransformReport};
use crate::transform::KeyStrategy;

/// Transform command arguments
#[derive(Debug, Clone)]
pub struct TransformArgs {
    /// Directory holding `.shelter-pipeline.toml`
    pub project_dir: PathBuf,
    /// Explicit snapshot file instead of the latest
    pub snapshot: Option<PathBuf>,
    pub raw_dir: Option<PathBuf>,
    pub clean_dir: Option<PathBuf>,
    /// Derive dimension keys from natural keys
    pub deterministic_keys: bool,
    /// Print the report as JSON
    pub json: bool,
}

impl TransformArgs {
    /// Transform options after applying the flags over `config`
    pub fn options(&self, config: &PipelineConfig) -> TransformOptions {
        let mut options =
            TransformOptions::from_config(config).with_snapshot(self.snapshot.clone());
        if let Some(raw_dir) = &self.raw_dir {
            options.raw_dir = raw_dir.clone();
        }
        if let Some(clean_dir) = &self.clean_dir {
            options.clean_dir = clean_dir.clone();
        }
        if self.deterministic_keys {
            options.key_strategy = KeyStrategy::Deterministic;
        }
        options
    }
}

/// Run the transform stage
pub fn handle_transform(args: &TransformArgs) -> Result<(), CliError> {
    let config = load_config(&args.project_dir)?;
    let options = args.options(&config);

    let output = pipeline::transform(&options)?;

    if args.json {
        print_json(&output.report)
    } else {
        print_transform_report(&output.report);
        Ok(())
    }
}

pub(crate) fn print_transform_report(report: &TransformReport) {
    println!(
        "Transformed {} (snapshot date {})",
        report.snapshot_file, report.snapshot_date
    );
    println!("  Key strategy: {}", report.key_strategy);
    println!(
        "  Rows read: {}, corrections: {}",
        report.quality.rows,
        report.quality.corrections()
    );
    if report.facts.skipped_without_pet_id > 0 {
        println!(
            "  Rows skipped without pet_id: {}",
            report.facts.skipped_without_pet_id
        );
    }
    if report.facts.unresolved_total() > 0 {
        println!(
            "  Unresolved foreign keys: {} (type_id {}, breed_id {}, shelter_id {})",
            report.facts.unresolved_total(),
            report.facts.unresolved_type_id,
            report.facts.unresolved_breed_id,
            report.facts.unresolved_shelter_id
        );
    }
    for count in &report.tables {
        println!("  {}: {} rows", count.table, count.rows);
    }
    println!("  Wrote {} files", report.outputs.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let config = PipelineConfig::default();
        let args = TransformArgs {
            project_dir: PathBuf::from("."),
            snapshot: Some(PathBuf::from("raw/animals_snapshot_20250601_000000.csv")),
            raw_dir: None,
            clean_dir: Some(PathBuf::from("out")),
            deterministic_keys: true,
            json: false,
        };

        let options = args.options(&config);
        assert_eq!(options.raw_dir, PathBuf::from("raw"));
        assert_eq!(options.clean_dir, PathBuf::from("out"));
        assert_eq!(options.key_strategy, KeyStrategy::Deterministic);
        assert!(options.snapshot.is_some());
    }

    #[test]
    fn test_config_strategy_kept_without_flag() {
        let mut config = PipelineConfig::default();
        config.transform.key_strategy = KeyStrategy::Deterministic;
        let args = TransformArgs {
            project_dir: PathBuf::from("."),
            snapshot: None,
            raw_dir: None,
            clean_dir: None,
            deterministic_keys: false,
            json: true,
        };

        assert_eq!(args.options(&config).key_strategy, KeyStrategy::Deterministic);
    }
}
