//! Run CLI command
//!
//! Transform followed by load, reading back the files the transform wrote.

use serde::Serialize;

use crate::cli::commands::load::{LoadArgs, print_load_report};
use crate::cli::commands::transform::{TransformArgs, print_transform_report};
use crate::cli::commands::{load_config, open_destination, print_json, runtime};
use crate::cli::error::CliError;
use crate::database::LoadReport;
use crate::pipeline::{self, TransformReport};

/// Run command arguments
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub transform: TransformArgs,
    /// `clean_dir` is ignored; the load reads what the transform wrote
    pub load: LoadArgs,
}

#[derive(Serialize)]
struct RunReport<'a> {
    transform: &'a TransformReport,
    load: &'a LoadReport,
}

/// Run both stages
pub fn handle_run(args: &RunArgs) -> Result<(), CliError> {
    let config = load_config(&args.transform.project_dir)?;
    let options = args.transform.options(&config);
    let (_, format) = args.load.source(&config);

    let rt = runtime()?;
    let (transform_report, load_report) = rt.block_on(async {
        let destination = open_destination(&args.load.destination, &config).await?;
        Ok::<_, CliError>(pipeline::run(&options, format, destination).await?)
    })?;

    if args.transform.json || args.load.json {
        print_json(&RunReport {
            transform: &transform_report,
            load: &load_report,
        })
    } else {
        print_transform_report(&transform_report);
        print_load_report(&load_report);
        Ok(())
    }
}
