//! Status CLI command
//!
//! Prints destination row counts and the snapshot ledger.

use std::path::PathBuf;

use crate::cli::commands::{DestinationArgs, load_config, open_destination, print_json, runtime};
use crate::cli::error::CliError;
use crate::database::DestinationStatus;

/// Status command arguments
#[derive(Debug, Clone)]
pub struct StatusArgs {
    /// Directory holding `.shelter-pipeline.toml`
    pub project_dir: PathBuf,
    pub destination: DestinationArgs,
    /// Print the status as JSON
    pub json: bool,
}

/// Show destination status
pub fn handle_status(args: &StatusArgs) -> Result<(), CliError> {
    let config = load_config(&args.project_dir)?;

    let rt = runtime()?;
    let status = rt.block_on(async {
        let destination = open_destination(&args.destination, &config).await?;
        Ok::<_, CliError>(DestinationStatus::collect(&destination).await?)
    })?;

    if args.json {
        return print_json(&status);
    }

    println!("Destination: {}", status.backend);
    println!();
    println!("Tables:");
    for (table, rows) in &status.row_counts {
        println!("  {:<18} {}", table, rows);
    }
    println!();

    if status.snapshots.is_empty() {
        println!("No snapshots loaded");
    } else {
        println!("Loaded snapshots:");
        for entry in &status.snapshots {
            let loaded_at = entry
                .loaded_at
                .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {}  {}  {}",
                entry.snapshot_file, entry.snapshot_date, loaded_at
            );
        }
    }

    Ok(())
}
