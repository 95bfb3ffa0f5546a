//! Load CLI command
//!
//! Reads the clean tables back from disk and applies them to the
//! destination at most once per snapshot.

use std::path::PathBuf;

use crate::cli::commands::{DestinationArgs, load_config, open_destination, print_json, runtime};
use crate::cli::error::CliError;
use crate::database::{LoadOutcome, LoadReport, PipelineConfig};
use crate::models::TableFormat;
use crate::pipeline;

/// Load command arguments
#[derive(Debug, Clone)]
pub struct LoadArgs {
    /// Directory holding `.shelter-pipeline.toml`
    pub project_dir: PathBuf,
    pub clean_dir: Option<PathBuf>,
    /// Clean table serialization to read
    pub format: Option<TableFormat>,
    pub destination: DestinationArgs,
    /// Print the report as JSON
    pub json: bool,
}

impl LoadArgs {
    /// Clean directory and format after applying the flags over `config`
    pub fn source(&self, config: &PipelineConfig) -> (PathBuf, TableFormat) {
        (
            self.clean_dir
                .clone()
                .unwrap_or_else(|| config.paths.clean_dir.clone()),
            self.format.unwrap_or(config.destination.format),
        )
    }
}

/// Run the load stage
pub fn handle_load(args: &LoadArgs) -> Result<(), CliError> {
    let config = load_config(&args.project_dir)?;
    let (clean_dir, format) = args.source(&config);

    let rt = runtime()?;
    let report = rt.block_on(async {
        let destination = open_destination(&args.destination, &config).await?;
        Ok::<_, CliError>(pipeline::load(clean_dir, format, destination).await?)
    })?;

    if args.json {
        print_json(&report)
    } else {
        print_load_report(&report);
        Ok(())
    }
}

pub(crate) fn print_load_report(report: &LoadReport) {
    match report.outcome {
        LoadOutcome::AlreadyLoaded => {
            println!(
                "Snapshot {} already loaded; nothing written",
                report.snapshot_file
            );
        }
        LoadOutcome::Loaded => {
            println!(
                "Loaded {} (snapshot date {}) in {}ms",
                report.snapshot_file, report.snapshot_date, report.duration_ms
            );
            for table in &report.tables {
                if table.skipped {
                    println!("  {}: empty, skipped", table.table);
                } else {
                    println!("  {}: {} rows upserted", table.table, table.rows);
                }
            }
            println!("  Total: {} rows", report.total_rows());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_defaults_from_config() {
        let mut config = PipelineConfig::default();
        config.destination.format = TableFormat::Csv;
        let args = LoadArgs {
            project_dir: PathBuf::from("."),
            clean_dir: None,
            format: None,
            destination: DestinationArgs::default(),
            json: false,
        };

        assert_eq!(
            args.source(&config),
            (PathBuf::from("clean_parquet"), TableFormat::Csv)
        );
    }

    #[test]
    fn test_source_flags_win() {
        let args = LoadArgs {
            project_dir: PathBuf::from("."),
            clean_dir: Some(PathBuf::from("elsewhere")),
            format: Some(TableFormat::Parquet),
            destination: DestinationArgs::default(),
            json: false,
        };

        let mut config = PipelineConfig::default();
        config.destination.format = TableFormat::Csv;
        assert_eq!(
            args.source(&config),
            (PathBuf::from("elsewhere"), TableFormat::Parquet)
        );
    }
}
