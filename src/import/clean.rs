//! Clean table reader
//!
//! Reads the intermediate tables written by the transform back into
//! text-encoded [`TableData`], in the declared column order.

use std::path::{Path, PathBuf};

use super::{SnapshotError, SnapshotResult, describe_columns, read_text_columns, sql_path};
use crate::models::{CleanTable, CleanTables, ColumnData, TableData, TableFormat};

/// Reads clean tables from a directory in one serialization
#[derive(Debug, Clone)]
pub struct CleanTableReader {
    clean_dir: PathBuf,
    format: TableFormat,
}

impl CleanTableReader {
    pub fn new(clean_dir: impl Into<PathBuf>, format: TableFormat) -> Self {
        Self {
            clean_dir: clean_dir.into(),
            format,
        }
    }

    /// File that holds `table`
    pub fn path_for(&self, table: CleanTable) -> PathBuf {
        self.clean_dir
            .join(format!("{}.{}", table.name(), self.format.extension()))
    }

    /// Directory tables are read from
    pub fn clean_dir(&self) -> &Path {
        &self.clean_dir
    }

    /// Read one table
    ///
    /// Extra columns in the file are ignored; missing layout columns fail.
    pub fn read_table(&self, table: CleanTable) -> SnapshotResult<TableData> {
        let path = self.path_for(table);
        if !path.exists() {
            return Err(SnapshotError::NotFound(path));
        }

        let conn = duckdb::Connection::open_in_memory()?;
        let source = match self.format {
            TableFormat::Parquet => format!("read_parquet({})", sql_path(&path)),
            TableFormat::Csv => format!(
                "read_csv({}, header = true, all_varchar = true)",
                sql_path(&path)
            ),
        };

        let present = describe_columns(&conn, &source)?;
        let missing: Vec<String> = table
            .columns()
            .iter()
            .filter(|def| !present.iter().any(|p| p == def.name))
            .map(|def| def.name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SnapshotError::MissingColumns {
                file: path.to_string_lossy().into_owned(),
                missing,
            });
        }

        let names: Vec<&str> = table.columns().iter().map(|def| def.name).collect();
        let values = read_text_columns(&conn, &source, &names)?;
        let columns = names
            .iter()
            .zip(values)
            .map(|(name, values)| ColumnData::new(*name, values))
            .collect();

        let data = TableData::new(columns).map_err(SnapshotError::ReadFailed)?;
        tracing::debug!(
            table = %table,
            rows = data.row_count(),
            path = %path.display(),
            "Read clean table"
        );
        Ok(data)
    }

    /// Read all four tables
    pub fn read_all(&self) -> SnapshotResult<CleanTables> {
        Ok(CleanTables {
            pet_types: self.read_table(CleanTable::PetTypes)?,
            breeds: self.read_table(CleanTable::Breeds)?,
            shelters: self.read_table(CleanTable::Shelters)?,
            animals: self.read_table(CleanTable::Animals)?,
        })
    }
}
