//! Init CLI command
//!
//! Creates the destination tables and, optionally, a starter configuration
//! file.

use std::path::PathBuf;

use crate::cli::commands::{DestinationArgs, load_config, open_destination, runtime};
use crate::cli::error::CliError;
use crate::database::config::CONFIG_FILENAME;

/// Init command arguments
#[derive(Debug, Clone)]
pub struct InitArgs {
    /// Directory holding `.shelter-pipeline.toml`
    pub project_dir: PathBuf,
    pub destination: DestinationArgs,
    /// Write the effective configuration if no config file exists yet
    pub write_config: bool,
}

/// Provision the destination
pub fn handle_init(args: &InitArgs) -> Result<(), CliError> {
    let mut config = load_config(&args.project_dir)?;
    let (backend, duckdb_path) = args.destination.resolve(&config);

    let rt = runtime()?;
    rt.block_on(async {
        let destination = open_destination(&args.destination, &config).await?;
        destination.initialize().await?;
        if !destination.health_check().await? {
            return Err(CliError::InvalidArgument(format!(
                "{} destination failed its health check",
                destination.backend_type()
            )));
        }
        Ok(())
    })?;

    println!("Initialized {} destination", backend);

    if args.write_config {
        let config_path = args.project_dir.join(CONFIG_FILENAME);
        if config_path.exists() {
            println!("Config already exists: {}", config_path.display());
        } else {
            config.destination.backend = backend;
            config.destination.duckdb_path = duckdb_path;
            config.save(&args.project_dir)?;
            println!("Wrote {}", config_path.display());
        }
    }

    Ok(())
}
