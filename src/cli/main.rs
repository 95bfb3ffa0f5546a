//! CLI binary entry point for shelter-pipeline

#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand};
#[cfg(feature = "cli")]
use shelter_data_pipeline::cli::commands::DestinationArgs;
#[cfg(feature = "cli")]
use shelter_data_pipeline::cli::commands::init::{InitArgs, handle_init};
#[cfg(feature = "cli")]
use shelter_data_pipeline::cli::commands::load::{LoadArgs, handle_load};
#[cfg(feature = "cli")]
use shelter_data_pipeline::cli::commands::run::{RunArgs, handle_run};
#[cfg(feature = "cli")]
use shelter_data_pipeline::cli::commands::status::{StatusArgs, handle_status};
#[cfg(feature = "cli")]
use shelter_data_pipeline::cli::commands::transform::{TransformArgs, handle_transform};
#[cfg(feature = "cli")]
use shelter_data_pipeline::database::DestinationBackendType;
#[cfg(feature = "cli")]
use shelter_data_pipeline::models::TableFormat;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "shelter-pipeline")]
#[command(about = "Transform shelter-animal snapshots and load them incrementally")]
#[command(version)]
struct Cli {
    /// Directory holding .shelter-pipeline.toml
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Args, Clone)]
struct TransformFlags {
    /// Snapshot file to process instead of the latest one
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Directory holding animals_snapshot_*.csv
    #[arg(long)]
    raw_dir: Option<PathBuf>,
    /// Directory the clean tables are written to
    #[arg(long)]
    clean_dir: Option<PathBuf>,
    /// Derive dimension keys from natural keys instead of generating them
    #[arg(long)]
    deterministic_keys: bool,
}

#[cfg(feature = "cli")]
#[derive(Args, Clone)]
struct DestinationFlags {
    /// Destination backend (duckdb, postgres)
    #[arg(long)]
    backend: Option<DestinationBackendType>,
    /// DuckDB database file (duckdb backend only)
    #[arg(long)]
    duckdb_path: Option<PathBuf>,
}

#[cfg(feature = "cli")]
impl From<DestinationFlags> for DestinationArgs {
    fn from(flags: DestinationFlags) -> Self {
        DestinationArgs {
            backend: flags.backend,
            duckdb_path: flags.duckdb_path,
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Build the clean tables of the latest (or given) snapshot
    Transform {
        #[command(flatten)]
        flags: TransformFlags,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Apply the clean tables to the destination
    Load {
        /// Directory the clean tables are read from
        #[arg(long)]
        clean_dir: Option<PathBuf>,
        /// Clean table format to read (parquet, csv)
        #[arg(long)]
        format: Option<TableFormat>,
        #[command(flatten)]
        destination: DestinationFlags,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Transform then load
    Run {
        #[command(flatten)]
        flags: TransformFlags,
        /// Clean table format to read back (parquet, csv)
        #[arg(long)]
        format: Option<TableFormat>,
        #[command(flatten)]
        destination: DestinationFlags,
        /// Print both reports as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show destination row counts and loaded snapshots
    Status {
        #[command(flatten)]
        destination: DestinationFlags,
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create the destination tables
    Init {
        #[command(flatten)]
        destination: DestinationFlags,
        /// Write .shelter-pipeline.toml if it doesn't exist
        #[arg(long)]
        write_config: bool,
    },
}

#[cfg(feature = "cli")]
fn transform_args(project_dir: PathBuf, flags: TransformFlags, json: bool) -> TransformArgs {
    TransformArgs {
        project_dir,
        snapshot: flags.snapshot,
        raw_dir: flags.raw_dir,
        clean_dir: flags.clean_dir,
        deterministic_keys: flags.deterministic_keys,
        json,
    }
}

#[cfg(feature = "cli")]
fn main() {
    let _ = dotenvy::dotenv();
    shelter_data_pipeline::cli::init_tracing();

    let cli = Cli::parse();
    let project_dir = cli.project_dir;

    let result = match cli.command {
        Commands::Transform { flags, json } => {
            handle_transform(&transform_args(project_dir, flags, json))
        }
        Commands::Load {
            clean_dir,
            format,
            destination,
            json,
        } => {
            let args = LoadArgs {
                project_dir,
                clean_dir,
                format,
                destination: destination.into(),
                json,
            };
            handle_load(&args)
        }
        Commands::Run {
            flags,
            format,
            destination,
            json,
        } => {
            let load = LoadArgs {
                project_dir: project_dir.clone(),
                clean_dir: flags.clean_dir.clone(),
                format,
                destination: destination.into(),
                json,
            };
            let args = RunArgs {
                transform: transform_args(project_dir, flags, json),
                load,
            };
            handle_run(&args)
        }
        Commands::Status { destination, json } => {
            let args = StatusArgs {
                project_dir,
                destination: destination.into(),
                json,
            };
            handle_status(&args)
        }
        Commands::Init {
            destination,
            write_config,
        } => {
            let args = InitArgs {
                project_dir,
                destination: destination.into(),
                write_config,
            };
            handle_init(&args)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
