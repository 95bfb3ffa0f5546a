//! CLI command implementations

pub mod init;
pub mod load;
pub mod run;
pub mod status;
pub mod transform;

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::error::CliError;
use crate::database::{
    DestinationBackendType, Destination, DuckDBDestination, PipelineConfig,
};

/// Destination selection shared by `load`, `run`, `status` and `init`
#[derive(Debug, Clone, Default)]
pub struct DestinationArgs {
    /// Overrides `[destination] backend`
    pub backend: Option<DestinationBackendType>,
    /// Overrides `[destination] duckdb_path`
    pub duckdb_path: Option<PathBuf>,
}

impl DestinationArgs {
    /// Backend and DuckDB path after applying the flags over `config`
    pub fn resolve(&self, config: &PipelineConfig) -> (DestinationBackendType, PathBuf) {
        (
            self.backend.unwrap_or(config.destination.backend),
            self.duckdb_path
                .clone()
                .unwrap_or_else(|| config.destination.duckdb_path.clone()),
        )
    }
}

/// Load `.shelter-pipeline.toml` from `project_dir`, with environment overrides
pub(crate) fn load_config(project_dir: &Path) -> Result<PipelineConfig, CliError> {
    Ok(PipelineConfig::load(project_dir)?)
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::IoError(format!("Failed to create runtime: {}", e)))
}

/// Open the selected destination
///
/// PostgreSQL credentials are read from the `PG*` environment variables
/// here, so a missing password fails before anything else happens.
pub(crate) async fn open_destination(
    args: &DestinationArgs,
    config: &PipelineConfig,
) -> Result<Box<dyn Destination>, CliError> {
    let (backend, duckdb_path) = args.resolve(config);

    match backend {
        DestinationBackendType::DuckDB => {
            let destination = DuckDBDestination::new(&duckdb_path)?;
            // The embedded file starts empty; its tables are created on demand.
            destination.initialize().await?;
            Ok(Box::new(destination))
        }
        DestinationBackendType::Postgres => {
            #[cfg(feature = "postgres-backend")]
            {
                use crate::database::{DestinationConfig, PostgresDestination};

                let pg_config = DestinationConfig::from_env()?;
                let destination = PostgresDestination::connect(&pg_config).await?;
                Ok(Box::new(destination))
            }
            #[cfg(not(feature = "postgres-backend"))]
            {
                Err(CliError::InvalidArgument(
                    "PostgreSQL backend not enabled. Build with --features postgres-backend"
                        .to_string(),
                ))
            }
        }
    }
}

/// Print `value` as pretty JSON on stdout
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::SerializationError(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_args_override_config() {
        let config = PipelineConfig::default();

        let (backend, path) = DestinationArgs::default().resolve(&config);
        assert_eq!(backend, DestinationBackendType::Postgres);
        assert_eq!(path, PathBuf::from("pet_adoption.duckdb"));

        let args = DestinationArgs {
            backend: Some(DestinationBackendType::DuckDB),
            duckdb_path: Some(PathBuf::from("/tmp/local.duckdb")),
        };
        let (backend, path) = args.resolve(&config);
        assert_eq!(backend, DestinationBackendType::DuckDB);
        assert_eq!(path, PathBuf::from("/tmp/local.duckdb"));
    }

    #[tokio::test]
    async fn test_open_duckdb_destination_initializes_tables() {
        let dir = tempfile::tempdir().unwrap();
        let args = DestinationArgs {
            backend: Some(DestinationBackendType::DuckDB),
            duckdb_path: Some(dir.path().join("cli.duckdb")),
        };

        let destination = open_destination(&args, &PipelineConfig::default())
            .await
            .unwrap();
        assert_eq!(destination.backend_type(), "duckdb");
        assert_eq!(destination.count_rows("animals").await.unwrap(), 0);
    }
}
