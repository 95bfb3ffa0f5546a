//! Pipeline configuration file support
//!
//! Handles parsing of `.shelter-pipeline.toml` configuration files,
//! environment variable overrides, and the PostgreSQL connection
//! parameters read from the standard `PG*` variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{DatabaseError, DatabaseResult};
use crate::models::TableFormat;
use crate::transform::KeyStrategy;

/// Default configuration filename
pub const CONFIG_FILENAME: &str = ".shelter-pipeline.toml";

/// Default raw snapshot directory
pub const DEFAULT_RAW_DIR: &str = "raw";

/// Default clean output directory
pub const DEFAULT_CLEAN_DIR: &str = "clean_parquet";

/// Default database filename for DuckDB
pub const DEFAULT_DUCKDB_FILENAME: &str = "pet_adoption.duckdb";

/// Environment variable for the raw snapshot directory
pub const ENV_RAW_DIR: &str = "SHELTER_RAW_DIR";

/// Environment variable for the clean output directory
pub const ENV_CLEAN_DIR: &str = "SHELTER_CLEAN_DIR";

/// Environment variable for destination backend
pub const ENV_DB_BACKEND: &str = "SHELTER_DB_BACKEND";

/// Environment variable for DuckDB path
pub const ENV_DUCKDB_PATH: &str = "SHELTER_DUCKDB_PATH";

/// Environment variable for the surrogate key strategy
pub const ENV_KEY_STRATEGY: &str = "SHELTER_KEY_STRATEGY";

/// Environment variable for the clean table format the loader reads
pub const ENV_LOAD_FORMAT: &str = "SHELTER_LOAD_FORMAT";

/// PostgreSQL connection variables
pub const ENV_PGHOST: &str = "PGHOST";
pub const ENV_PGPORT: &str = "PGPORT";
pub const ENV_PGDATABASE: &str = "PGDATABASE";
pub const ENV_PGUSER: &str = "PGUSER";
pub const ENV_PGPASSWORD: &str = "PGPASSWORD";

/// Destination backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationBackendType {
    /// DuckDB embedded database
    DuckDB,
    /// PostgreSQL database (default)
    #[default]
    Postgres,
}

impl std::str::FromStr for DestinationBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "duckdb" => Ok(DestinationBackendType::DuckDB),
            "postgres" | "postgresql" => Ok(DestinationBackendType::Postgres),
            _ => Err(format!(
                "Unknown destination backend: {}. Use 'duckdb' or 'postgres'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for DestinationBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DestinationBackendType::DuckDB => write!(f, "duckdb"),
            DestinationBackendType::Postgres => write!(f, "postgres"),
        }
    }
}

/// Paths configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsSection {
    /// Directory holding `animals_snapshot_*.csv`
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,

    /// Directory the clean tables are written to and loaded from
    #[serde(default = "default_clean_dir")]
    pub clean_dir: PathBuf,
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from(DEFAULT_RAW_DIR)
}

fn default_clean_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CLEAN_DIR)
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            clean_dir: default_clean_dir(),
        }
    }
}

/// Transform configuration section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformSection {
    /// How dimension keys are generated
    #[serde(default)]
    pub key_strategy: KeyStrategy,
}

/// Destination configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationSection {
    /// Destination backend type
    #[serde(default)]
    pub backend: DestinationBackendType,

    /// Path to DuckDB database file (used when backend = "duckdb")
    #[serde(default = "default_duckdb_path")]
    pub duckdb_path: PathBuf,

    /// Clean table serialization the loader reads
    #[serde(default)]
    pub format: TableFormat,
}

fn default_duckdb_path() -> PathBuf {
    PathBuf::from(DEFAULT_DUCKDB_FILENAME)
}

impl Default for DestinationSection {
    fn default() -> Self {
        Self {
            backend: DestinationBackendType::default(),
            duckdb_path: default_duckdb_path(),
            format: TableFormat::default(),
        }
    }
}

/// Main configuration structure
///
/// Represents the `.shelter-pipeline.toml` configuration file format.
/// PostgreSQL credentials are never read from the file; see
/// [`DestinationConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    /// Input and output directories
    #[serde(default)]
    pub paths: PathsSection,

    /// Transform options
    #[serde(default)]
    pub transform: TransformSection,

    /// Destination options
    #[serde(default)]
    pub destination: DestinationSection,
}

impl PipelineConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a project directory
    ///
    /// Looks for `.shelter-pipeline.toml` in `dir`, falls back to defaults
    /// if not found, then applies environment overrides.
    pub fn load(dir: &Path) -> DatabaseResult<Self> {
        let config_path = dir.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| DatabaseError::IoError(format!("Failed to read config: {}", e)))?;

            Self::parse(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> DatabaseResult<Self> {
        toml::from_str(content)
            .map_err(|e| DatabaseError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a project directory
    pub fn save(&self, dir: &Path) -> DatabaseResult<()> {
        let content = self.to_toml()?;

        std::fs::write(dir.join(CONFIG_FILENAME), content)
            .map_err(|e| DatabaseError::IoError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> DatabaseResult<String> {
        toml::to_string_pretty(self).map_err(|e| {
            DatabaseError::SerializationError(format!("Failed to serialize config: {}", e))
        })
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; unparsable values are ignored with a warning
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_RAW_DIR) {
            self.paths.raw_dir = PathBuf::from(dir);
        }

        if let Some(dir) = lookup(ENV_CLEAN_DIR) {
            self.paths.clean_dir = PathBuf::from(dir);
        }

        if let Some(backend) = lookup(ENV_DB_BACKEND) {
            match backend.parse() {
                Ok(backend) => self.destination.backend = backend,
                Err(e) => tracing::warn!(variable = ENV_DB_BACKEND, "{}", e),
            }
        }

        if let Some(path) = lookup(ENV_DUCKDB_PATH) {
            self.destination.duckdb_path = PathBuf::from(path);
        }

        if let Some(strategy) = lookup(ENV_KEY_STRATEGY) {
            match strategy.parse() {
                Ok(strategy) => self.transform.key_strategy = strategy,
                Err(e) => tracing::warn!(variable = ENV_KEY_STRATEGY, "{}", e),
            }
        }

        if let Some(format) = lookup(ENV_LOAD_FORMAT) {
            match format.parse() {
                Ok(format) => self.destination.format = format,
                Err(e) => tracing::warn!(variable = ENV_LOAD_FORMAT, "{}", e),
            }
        }
    }
}

/// PostgreSQL connection parameters
///
/// Built once at startup and passed explicitly to the destination.
#[derive(Clone, PartialEq, Eq)]
pub struct DestinationConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl DestinationConfig {
    /// Read connection parameters from the process environment
    pub fn from_env() -> DatabaseResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read connection parameters through `lookup`
    ///
    /// Every parameter but the password has a default; a missing or empty
    /// password fails with [`DatabaseError::MissingCredential`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DatabaseResult<Self> {
        let value = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port = value(ENV_PGPORT, "5432");
        let port = port.trim().parse::<u16>().map_err(|e| {
            DatabaseError::ConfigError(format!("Invalid {} '{}': {}", ENV_PGPORT, port, e))
        })?;

        let password = lookup(ENV_PGPASSWORD)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| DatabaseError::MissingCredential(ENV_PGPASSWORD.to_string()))?;

        Ok(Self {
            host: value(ENV_PGHOST, "localhost"),
            port,
            dbname: value(ENV_PGDATABASE, "pet_adoption"),
            user: value(ENV_PGUSER, "postgres"),
            password,
        })
    }

    /// Connection description with the password masked
    pub fn connection_string_masked(&self) -> String {
        format!(
            "postgresql://{}:****@{}:{}/{}",
            self.user, self.host, self.port, self.dbname
        )
    }
}

impl std::fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"****")
            .finish()
    }
}
