//! Clean table writer
//!
//! Every table is staged into a scratch DuckDB table of text columns and
//! written with `COPY`, casting each column to its declared type. All files
//! of a run land in a staging directory first and are moved into the clean
//! directory only once every write has succeeded.

use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{ExportError, ExportResult};
use crate::import::{sql_ident, sql_path};
use crate::models::{CleanTable, CleanTables, ColumnKind, TableData, TableFormat};

/// Writes clean tables into a directory
#[derive(Debug, Clone)]
pub struct CleanTableWriter {
    clean_dir: PathBuf,
}

/// Every table is written in both serializations
const OUTPUT_FORMATS: [TableFormat; 2] = [TableFormat::Csv, TableFormat::Parquet];

impl CleanTableWriter {
    /// Writer producing both CSV and Parquet for every table
    pub fn new(clean_dir: impl Into<PathBuf>) -> Self {
        Self {
            clean_dir: clean_dir.into(),
        }
    }

    /// Target directory
    pub fn clean_dir(&self) -> &Path {
        &self.clean_dir
    }

    /// Write all four tables
    ///
    /// Returns the final paths of every written file. On failure the clean
    /// directory is left as it was and the staging directory is removed.
    pub fn write_all(&self, tables: &CleanTables) -> ExportResult<Vec<PathBuf>> {
        fs::create_dir_all(&self.clean_dir)?;
        let staging = self.clean_dir.join(format!(".staging-{}", Uuid::new_v4()));
        fs::create_dir(&staging)?;

        let result = self
            .stage_all(tables, &staging)
            .and_then(|staged| self.promote(&staging, staged));

        if let Err(e) = fs::remove_dir_all(&staging)
            && staging.exists()
        {
            tracing::warn!(
                path = %staging.display(),
                error = %e,
                "Failed to remove staging directory"
            );
        }

        result
    }

    fn stage_all(&self, tables: &CleanTables, staging: &Path) -> ExportResult<Vec<String>> {
        let conn = duckdb::Connection::open_in_memory()?;
        let mut files = Vec::new();

        for table in CleanTable::LOAD_ORDER {
            let data = tables
                .get(table)
                .project(table)
                .map_err(|missing| ExportError::InvalidTable {
                    table: table.to_string(),
                    reason: format!("missing columns {:?}", missing),
                })?;

            stage_table(&conn, table, &data)?;
            for format in OUTPUT_FORMATS {
                let file_name = format!("{}.{}", table.name(), format.extension());
                copy_table(&conn, table, format, &staging.join(&file_name))?;
                files.push(file_name);
            }
            conn.execute_batch(&format!("DROP TABLE {}", stage_name(table)))?;

            tracing::info!(table = %table, rows = data.row_count(), "Saved clean table");
        }

        Ok(files)
    }

    /// Move staged files into the clean directory
    ///
    /// Replaced files are parked under the staging directory until every
    /// move succeeded; on failure the moves already made are undone.
    fn promote(&self, staging: &Path, files: Vec<String>) -> ExportResult<Vec<PathBuf>> {
        let previous_dir = staging.join(".previous");
        fs::create_dir(&previous_dir)?;

        let mut moved: Vec<(String, bool)> = Vec::with_capacity(files.len());
        for file in files {
            let target = self.clean_dir.join(&file);
            match replace_file(&staging.join(&file), &target, &previous_dir.join(&file)) {
                Ok(replaced) => moved.push((file, replaced)),
                Err(e) => {
                    self.roll_back(&moved, &previous_dir);
                    return Err(e.into());
                }
            }
        }

        let written: Vec<PathBuf> = moved
            .into_iter()
            .map(|(file, _)| self.clean_dir.join(file))
            .collect();
        tracing::info!(
            dir = %self.clean_dir.display(),
            files = written.len(),
            "Clean outputs written"
        );
        Ok(written)
    }

    fn roll_back(&self, moved: &[(String, bool)], previous_dir: &Path) {
        for (file, replaced) in moved.iter().rev() {
            let target = self.clean_dir.join(file);
            let restored = if *replaced {
                fs::rename(previous_dir.join(file), &target)
            } else {
                fs::remove_file(&target)
            };
            if let Err(e) = restored {
                tracing::warn!(
                    path = %target.display(),
                    error = %e,
                    "Failed to restore clean output"
                );
            }
        }
    }
}

/// Move `staged` to `target`, parking an existing `target` at `previous`
///
/// Returns whether a previous file was parked.
fn replace_file(staged: &Path, target: &Path, previous: &Path) -> std::io::Result<bool> {
    let replaced = target.exists();
    if replaced {
        fs::rename(target, previous)?;
    }
    if let Err(e) = fs::rename(staged, target) {
        if replaced && let Err(restore) = fs::rename(previous, target) {
            tracing::warn!(
                path = %target.display(),
                error = %restore,
                "Failed to restore clean output"
            );
        }
        return Err(e);
    }
    Ok(replaced)
}

const STAGE_PAGE_SIZE: usize = 1000;

fn stage_name(table: CleanTable) -> String {
    format!("stage_{}", table.name())
}

/// Load text columns into a scratch table
fn stage_table(conn: &duckdb::Connection, table: CleanTable, data: &TableData) -> ExportResult<()> {
    let columns = table
        .columns()
        .iter()
        .map(|def| format!("{} VARCHAR", sql_ident(def.name)))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute_batch(&format!("CREATE TABLE {} ({})", stage_name(table), columns))?;

    let row_placeholders = format!("({})", vec!["?"; data.columns.len()].join(", "));
    for page in data.pages(STAGE_PAGE_SIZE) {
        let sql = format!(
            "INSERT INTO {} VALUES {}",
            stage_name(table),
            vec![row_placeholders.as_str(); page.len()].join(", ")
        );
        conn.execute(&sql, duckdb::params_from_iter(data.row_params(page)))?;
    }
    Ok(())
}

/// `COPY` the scratch table to `path`, casting to declared column types
fn copy_table(
    conn: &duckdb::Connection,
    table: CleanTable,
    format: TableFormat,
    path: &Path,
) -> ExportResult<()> {
    let select = table
        .columns()
        .iter()
        .map(|def| {
            let ident = sql_ident(def.name);
            match def.kind {
                ColumnKind::Integer | ColumnKind::Date => {
                    format!("CAST({} AS {}) AS {}", ident, def.kind.sql_type(), ident)
                }
                ColumnKind::Text | ColumnKind::Uuid => ident,
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    let options = match format {
        TableFormat::Parquet => "FORMAT PARQUET",
        TableFormat::Csv => "FORMAT CSV, HEADER true",
    };

    conn.execute_batch(&format!(
        "COPY (SELECT {} FROM {}) TO {} ({})",
        select,
        stage_name(table),
        sql_path(path),
        options
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::CleanTableReader;
    use crate::models::{PetType, Shelter};
    use tempfile::tempdir;

    fn tables() -> CleanTables {
        let dog = PetType {
            type_id: Uuid::new_v4(),
            type_name: "Dog".to_string(),
        };
        let shelter = Shelter {
            shelter_id: Uuid::new_v4(),
            shelter_name: Some("A".to_string()),
            city: None,
            state: Some("TX".to_string()),
        };
        CleanTables {
            pet_types: TableData::from_pet_types(&[dog]),
            breeds: TableData::from_breeds(&[]),
            shelters: TableData::from_shelters(&[shelter]),
            animals: TableData::from_animals(&[]),
        }
    }

    #[test]
    fn test_write_all_formats() {
        let dir = tempdir().unwrap();
        let written = CleanTableWriter::new(dir.path()).write_all(&tables()).unwrap();
        assert_eq!(written.len(), 8);
        for path in &written {
            assert!(path.exists(), "{} missing", path.display());
        }

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".staging-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_written_tables_read_back() {
        let dir = tempdir().unwrap();
        let source = tables();
        CleanTableWriter::new(dir.path()).write_all(&source).unwrap();

        for format in [TableFormat::Csv, TableFormat::Parquet] {
            let reader = CleanTableReader::new(dir.path(), format);
            let shelters = reader.read_table(CleanTable::Shelters).unwrap();
            assert_eq!(shelters, source.shelters);
            let animals = reader.read_table(CleanTable::Animals).unwrap();
            assert!(animals.is_empty());
        }
    }

    #[test]
    fn test_failed_promote_restores_previous_outputs() {
        let dir = tempdir().unwrap();
        let writer = CleanTableWriter::new(dir.path());
        fs::write(dir.path().join("pet_types.csv"), "old").unwrap();

        let staging = dir.path().join(".staging-test");
        fs::create_dir(&staging).unwrap();
        fs::write(staging.join("pet_types.csv"), "new").unwrap();
        fs::write(staging.join("breeds.csv"), "new").unwrap();

        let files = vec![
            "pet_types.csv".to_string(),
            "breeds.csv".to_string(),
            "shelters.csv".to_string(),
        ];
        let err = writer.promote(&staging, files).unwrap_err();
        assert!(matches!(err, ExportError::IoError(_)));

        assert_eq!(fs::read_to_string(dir.path().join("pet_types.csv")).unwrap(), "old");
        assert!(!dir.path().join("breeds.csv").exists());
        assert!(!dir.path().join("shelters.csv").exists());
    }

    #[test]
    fn test_rewrite_replaces_previous_outputs() {
        let dir = tempdir().unwrap();
        let writer = CleanTableWriter::new(dir.path());
        writer.write_all(&tables()).unwrap();
        let first = CleanTableReader::new(dir.path(), TableFormat::Csv)
            .read_table(CleanTable::PetTypes)
            .unwrap();

        let second_tables = tables();
        writer.write_all(&second_tables).unwrap();
        let second = CleanTableReader::new(dir.path(), TableFormat::Parquet)
            .read_table(CleanTable::PetTypes)
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(second, second_tables.pet_types);
    }

    #[test]
    fn test_invalid_table_writes_nothing() {
        let dir = tempdir().unwrap();
        let mut bad = tables();
        bad.breeds = TableData::new(vec![]).unwrap();

        let err = CleanTableWriter::new(dir.path()).write_all(&bad).unwrap_err();
        assert!(matches!(err, ExportError::InvalidTable { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
