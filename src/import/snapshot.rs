//! Raw snapshot reader
//!
//! Picks a snapshot file (explicit, or the lexicographically latest in the
//! raw directory), checks its columns and derives the batch identity.

use std::path::{Path, PathBuf};

use super::{SnapshotError, SnapshotResult, describe_columns, read_text_columns, sql_path};
use crate::models::{
    REQUIRED_COLUMNS, RawAnimalRecord, SNAPSHOT_FILE_PATTERN, SnapshotBatch, SnapshotIdentity,
};
use crate::validation::{clean_text, parse_date};

/// Optional column some extracts already carry; must agree with the file name
const SNAPSHOT_FILE_COLUMN: &str = "snapshot_file";

/// Reads one raw snapshot batch into memory
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    raw_dir: PathBuf,
}

impl SnapshotReader {
    /// Create a reader over `raw_dir`
    pub fn new(raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
        }
    }

    /// Raw directory searched when no snapshot is named
    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    /// All snapshot files in the raw directory, sorted by name
    pub fn discover(&self) -> SnapshotResult<Vec<PathBuf>> {
        let pattern = self.raw_dir.join(SNAPSHOT_FILE_PATTERN);
        let pattern_str = pattern.to_string_lossy();
        let mut paths: Vec<PathBuf> = glob::glob(&pattern_str)
            .map_err(|e| SnapshotError::ReadFailed(format!("Invalid glob pattern: {}", e)))?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Pick the snapshot to process
    ///
    /// An explicit path is used as given and must exist. Otherwise the
    /// lexicographically latest file in the raw directory is chosen.
    pub fn pick_snapshot(&self, explicit: Option<&Path>) -> SnapshotResult<PathBuf> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(SnapshotError::NotFound(path.to_path_buf()));
            }
            return Ok(path.to_path_buf());
        }

        self.discover()?
            .pop()
            .ok_or_else(|| SnapshotError::NoSnapshots {
                dir: self.raw_dir.clone(),
                pattern: SNAPSHOT_FILE_PATTERN.to_string(),
            })
    }

    /// Pick and read a snapshot
    pub fn read(&self, explicit: Option<&Path>) -> SnapshotResult<SnapshotBatch> {
        let path = self.pick_snapshot(explicit)?;
        self.read_path(&path)
    }

    /// Read the whole batch at `path`
    ///
    /// Fails without returning any rows if a required column is missing or
    /// the batch does not carry exactly one snapshot date.
    pub fn read_path(&self, path: &Path) -> SnapshotResult<SnapshotBatch> {
        let snapshot_file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SnapshotError::NotFound(path.to_path_buf()))?;

        tracing::info!(path = %path.display(), "Loading raw snapshot");

        let conn = duckdb::Connection::open_in_memory()?;
        let source = format!(
            "read_csv({}, header = true, all_varchar = true)",
            sql_path(path)
        );

        let present = describe_columns(&conn, &source)?;
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !present.iter().any(|p| p == *c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SnapshotError::MissingColumns {
                file: snapshot_file,
                missing,
            });
        }

        if present.iter().any(|c| c == SNAPSHOT_FILE_COLUMN) {
            let [files] = read_text_columns(&conn, &source, &[SNAPSHOT_FILE_COLUMN])?
                .try_into()
                .map_err(|_| SnapshotError::ReadFailed("Unexpected column count".to_string()))?;
            check_embedded_snapshot_file(&files, &snapshot_file)?;
        }

        let columns = read_text_columns(&conn, &source, &REQUIRED_COLUMNS)?;
        let records = rows_from_columns(columns);
        let snapshot_date = batch_snapshot_date(&records)?;

        tracing::info!(
            snapshot = %snapshot_file,
            %snapshot_date,
            rows = records.len(),
            "Snapshot loaded"
        );

        Ok(SnapshotBatch {
            source_path: path.to_path_buf(),
            identity: SnapshotIdentity::new(snapshot_file, snapshot_date),
            records,
        })
    }
}

/// Turn the column-wise read of [`REQUIRED_COLUMNS`] into records
fn rows_from_columns(columns: Vec<Vec<Option<String>>>) -> Vec<RawAnimalRecord> {
    let rows = columns.first().map(Vec::len).unwrap_or(0);
    let mut iters: Vec<_> = columns.into_iter().map(Vec::into_iter).collect();
    let mut records = Vec::with_capacity(rows);

    for _ in 0..rows {
        let mut next = |i: usize| iters[i].next().flatten();
        records.push(RawAnimalRecord {
            pet_id: next(0),
            name: next(1),
            age: next(2),
            gender: next(3),
            size: next(4),
            status: next(5),
            date_arrived: next(6),
            adopted_date: next(7),
            type_name: next(8),
            breed: next(9),
            shelter_name: next(10),
            city: next(11),
            state: next(12),
            snapshot_date: next(13),
        });
    }
    records
}

/// An embedded `snapshot_file` column must hold one value: this file's name
fn check_embedded_snapshot_file(
    values: &[Option<String>],
    snapshot_file: &str,
) -> SnapshotResult<()> {
    let mut distinct: Vec<String> = values
        .iter()
        .filter_map(|v| clean_text(v.as_deref()))
        .collect();
    distinct.sort();
    distinct.dedup();

    match distinct.as_slice() {
        [] => Ok(()),
        [only] if only == snapshot_file => Ok(()),
        [only] => Err(SnapshotError::AmbiguousBatch(format!(
            "snapshot_file column holds '{}' but the file is '{}'",
            only, snapshot_file
        ))),
        many => Err(SnapshotError::AmbiguousBatch(format!(
            "{} distinct snapshot_file values: {:?}",
            many.len(),
            many
        ))),
    }
}

/// The one snapshot date shared by every row that carries a parsable one
///
/// Unparsable values are skipped here; the reconciler nulls and counts them,
/// and those rows inherit the batch date.
fn batch_snapshot_date(records: &[RawAnimalRecord]) -> SnapshotResult<chrono::NaiveDate> {
    let mut dates = Vec::new();
    let mut unparsable = 0usize;
    for raw in records
        .iter()
        .filter_map(|r| clean_text(r.snapshot_date.as_deref()))
    {
        match parse_date(&raw) {
            Some(date) if !dates.contains(&date) => dates.push(date),
            Some(_) => {}
            None => unparsable += 1,
        }
    }
    if unparsable > 0 {
        tracing::warn!(rows = unparsable, "Unparsable snapshot_date values ignored");
    }

    match dates.as_slice() {
        [date] => Ok(*date),
        [] => Err(SnapshotError::AmbiguousBatch(
            "no snapshot_date value in batch".to_string(),
        )),
        many => Err(SnapshotError::AmbiguousBatch(format!(
            "{} distinct snapshot_date values: {:?}",
            many.len(),
            many
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::tempdir;

    const HEADER: &str = "pet_id,name,age,gender,size,status,date_arrived,adopted_date,type,breed,shelter_name,city,state,snapshot_date";

    fn write_snapshot(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("{}\n{}", HEADER, body)).unwrap();
        path
    }

    #[test]
    fn test_pick_latest_snapshot() {
        let dir = tempdir().unwrap();
        write_snapshot(dir.path(), "animals_snapshot_20250101_000000.csv", "");
        write_snapshot(dir.path(), "animals_snapshot_20250601_000000.csv", "");
        fs::write(dir.path().join("notes.csv"), "x").unwrap();

        let picked = SnapshotReader::new(dir.path()).pick_snapshot(None).unwrap();
        assert_eq!(
            picked.file_name().unwrap().to_string_lossy(),
            "animals_snapshot_20250601_000000.csv"
        );
    }

    #[test]
    fn test_empty_raw_dir() {
        let dir = tempdir().unwrap();
        let err = SnapshotReader::new(dir.path()).pick_snapshot(None).unwrap_err();
        assert!(matches!(err, SnapshotError::NoSnapshots { .. }));
    }

    #[test]
    fn test_explicit_missing_path() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("animals_snapshot_missing.csv");
        let err = SnapshotReader::new(dir.path())
            .pick_snapshot(Some(&missing))
            .unwrap_err();
        assert!(matches!(err, SnapshotError::NotFound(_)));
    }

    #[test]
    fn test_read_batch() {
        let dir = tempdir().unwrap();
        let path = write_snapshot(
            dir.path(),
            "animals_snapshot_20250601_000000.csv",
            "p1,Rex,3,Male,Large,available,2025-01-01,,dog,Beagle,A,Austin,TX,2025-06-01\n\
             p2,Tom,,Male,Small,adopted,2025-02-01,,cat,Siamese,B,Boston,MA,2025-06-01\n",
        );

        let batch = SnapshotReader::new(dir.path()).read_path(&path).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.identity.snapshot_file, "animals_snapshot_20250601_000000.csv");
        assert_eq!(
            batch.identity.snapshot_date,
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
        );
        assert_eq!(batch.records[0].type_name.as_deref(), Some("dog"));
        assert_eq!(batch.records[1].age, None);
    }

    #[test]
    fn test_missing_columns_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("animals_snapshot_20250601_000000.csv");
        fs::write(&path, "pet_id,name,age\np1,Rex,3\n").unwrap();

        let err = SnapshotReader::new(dir.path()).read_path(&path).unwrap_err();
        match err {
            SnapshotError::MissingColumns { missing, .. } => {
                assert!(missing.contains(&"breed".to_string()));
                assert!(missing.contains(&"snapshot_date".to_string()));
                assert_eq!(missing.len(), 11);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_multiple_snapshot_dates_rejected() {
        let dir = tempdir().unwrap();
        let path = write_snapshot(
            dir.path(),
            "animals_snapshot_20250601_000000.csv",
            "p1,Rex,3,Male,Large,available,2025-01-01,,dog,Beagle,A,Austin,TX,2025-06-01\n\
             p2,Tom,2,Male,Small,available,2025-02-01,,cat,Siamese,B,Boston,MA,2025-06-02\n",
        );
        let err = SnapshotReader::new(dir.path()).read_path(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::AmbiguousBatch(_)));
    }

    #[test]
    fn test_unparsable_snapshot_date_is_skipped() {
        let dir = tempdir().unwrap();
        let path = write_snapshot(
            dir.path(),
            "animals_snapshot_20250601_000000.csv",
            "p1,Rex,3,Male,Large,available,2025-01-01,,dog,Beagle,A,Austin,TX,2025-06-01\n\
             p2,Tom,2,Male,Small,adopted,2025-02-01,,cat,Siamese,B,Boston,MA,not-a-date\n",
        );

        let batch = SnapshotReader::new(dir.path()).read_path(&path).unwrap();
        assert_eq!(
            batch.identity.snapshot_date,
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
        );
        assert_eq!(batch.len(), 2);

        let (records, report) = crate::validation::DataQualityReconciler::new().reconcile(&batch);
        assert_eq!(report.unparsable_dates, 1);
        assert_eq!(records[1].snapshot_date, Some(batch.identity.snapshot_date));
        assert_eq!(records[1].adopted_date, Some(batch.identity.snapshot_date));
    }

    #[test]
    fn test_only_unparsable_snapshot_dates_rejected() {
        let dir = tempdir().unwrap();
        let path = write_snapshot(
            dir.path(),
            "animals_snapshot_20250601_000000.csv",
            "p1,Rex,3,Male,Large,available,2025-01-01,,dog,Beagle,A,Austin,TX,someday\n",
        );
        let err = SnapshotReader::new(dir.path()).read_path(&path).unwrap_err();
        assert!(matches!(err, SnapshotError::AmbiguousBatch(_)));
    }

    #[test]
    fn test_embedded_snapshot_file_must_match() {
        let values = vec![Some("animals_snapshot_a.csv".to_string()), None];
        assert!(check_embedded_snapshot_file(&values, "animals_snapshot_a.csv").is_ok());
        assert!(check_embedded_snapshot_file(&values, "animals_snapshot_b.csv").is_err());

        let two = vec![Some("x.csv".to_string()), Some("y.csv".to_string())];
        assert!(matches!(
            check_embedded_snapshot_file(&two, "x.csv"),
            Err(SnapshotError::AmbiguousBatch(_))
        ));
    }
}
