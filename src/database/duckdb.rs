//! DuckDB destination implementation
//!
//! Provides an embedded destination store using DuckDB. Used for local runs
//! and, in-memory, for tests of the incremental loader.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::schema::DestinationSchema;
use super::{
    DatabaseError, DatabaseResult, Destination, LedgerInsert, UPSERT_PAGE_SIZE,
    ledger_entry_from_text,
};
use crate::models::{CleanTable, SnapshotLedgerEntry, TableData};

/// DuckDB destination
///
/// Supports both file-based persistence and in-memory mode.
pub struct DuckDBDestination {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    /// DuckDB connection (wrapped in Mutex for thread safety)
    connection: Mutex<duckdb::Connection>,
}

impl DuckDBDestination {
    /// Create a new DuckDB destination with a file-based database
    ///
    /// # Arguments
    /// * `db_path` - Path to the DuckDB database file
    ///
    /// # Returns
    /// A new DuckDB destination instance
    pub fn new(db_path: impl AsRef<Path>) -> DatabaseResult<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = duckdb::Connection::open(&path).map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to open DuckDB: {}", e))
        })?;

        tracing::debug!(path = %path.display(), "Opened DuckDB destination");

        Ok(Self {
            db_path: Some(path),
            connection: Mutex::new(connection),
        })
    }

    /// Create an in-memory DuckDB destination
    ///
    /// Useful for testing where persistence is not needed.
    pub fn in_memory() -> DatabaseResult<Self> {
        let connection = duckdb::Connection::open_in_memory().map_err(|e| {
            DatabaseError::ConnectionFailed(format!("Failed to create in-memory DuckDB: {}", e))
        })?;

        Ok(Self {
            db_path: None,
            connection: Mutex::new(connection),
        })
    }

    /// Get the database file path (None for in-memory)
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Check if this is an in-memory database
    pub fn is_in_memory(&self) -> bool {
        self.db_path.is_none()
    }

    fn lock(&self) -> DatabaseResult<MutexGuard<'_, duckdb::Connection>> {
        self.connection
            .lock()
            .map_err(|e| DatabaseError::ConnectionFailed(format!("Lock error: {}", e)))
    }

    /// Execute multiple SQL statements
    fn execute_batch(&self, sql: &str) -> DatabaseResult<()> {
        self.lock()?
            .execute_batch(sql)
            .map_err(|e| DatabaseError::MigrationFailed(format!("Batch execute failed: {}", e)))
    }

    /// Whether a DuckDB error is a primary key violation
    fn is_unique_violation(err: &duckdb::Error) -> bool {
        let message = err.to_string();
        message.contains("Duplicate key") || message.contains("violates primary key constraint")
    }
}

#[async_trait(?Send)]
impl Destination for DuckDBDestination {
    async fn initialize(&self) -> DatabaseResult<()> {
        self.execute_batch(&DestinationSchema::create_tables_sql(false))?;
        self.execute_batch(DestinationSchema::create_ledger_sql())?;
        tracing::info!(backend = "duckdb", "Destination tables ensured");
        Ok(())
    }

    async fn ensure_ledger(&self) -> DatabaseResult<()> {
        self.execute_batch(DestinationSchema::create_ledger_sql())
    }

    async fn upsert(&self, table: CleanTable, data: &TableData) -> DatabaseResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|e| {
            DatabaseError::TransactionFailed(format!("Failed to begin transaction: {}", e))
        })?;

        let mut written = 0;
        for page in data.pages(UPSERT_PAGE_SIZE) {
            let sql = DestinationSchema::upsert_sql(table, page.len());
            tracing::debug!(table = %table, rows = page.len(), "Upserting page");
            written += tx
                .execute(&sql, duckdb::params_from_iter(data.row_params(page)))
                .map_err(|e| {
                    DatabaseError::QueryFailed(format!("Upsert into {} failed: {}", table, e))
                })?;
        }

        tx.commit().map_err(|e| {
            DatabaseError::TransactionFailed(format!("Failed to commit {}: {}", table, e))
        })?;

        Ok(written)
    }

    async fn snapshot_loaded(&self, snapshot_file: &str) -> DatabaseResult<bool> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(DestinationSchema::snapshot_loaded_sql())
            .map_err(|e| DatabaseError::QueryFailed(format!("Prepare failed: {}", e)))?;
        let mut rows = stmt
            .query([snapshot_file])
            .map_err(|e| DatabaseError::QueryFailed(format!("Ledger lookup failed: {}", e)))?;
        let found = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(format!("Row fetch error: {}", e)))?
            .is_some();
        Ok(found)
    }

    async fn insert_ledger_entry(
        &self,
        entry: &SnapshotLedgerEntry,
    ) -> DatabaseResult<LedgerInsert> {
        let conn = self.lock()?;
        let result = conn.execute(
            DestinationSchema::insert_ledger_sql(),
            duckdb::params![entry.snapshot_file, entry.snapshot_date.to_string()],
        );

        match result {
            Ok(_) => Ok(LedgerInsert::Inserted),
            Err(e) if Self::is_unique_violation(&e) => Ok(LedgerInsert::Conflict),
            Err(e) => Err(DatabaseError::QueryFailed(format!(
                "Ledger insert failed: {}",
                e
            ))),
        }
    }

    async fn ledger_entries(&self) -> DatabaseResult<Vec<SnapshotLedgerEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(DestinationSchema::ledger_entries_sql())
            .map_err(|e| DatabaseError::QueryFailed(format!("Prepare failed: {}", e)))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| DatabaseError::QueryFailed(format!("Ledger query failed: {}", e)))?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(format!("Row fetch error: {}", e)))?
        {
            let file: String = row
                .get(0)
                .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
            let date: String = row
                .get(1)
                .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
            let loaded_at: Option<String> = row
                .get(2)
                .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
            entries.push(ledger_entry_from_text(file, &date, loaded_at.as_deref())?);
        }
        Ok(entries)
    }

    async fn count_rows(&self, table: &str) -> DatabaseResult<u64> {
        if !DestinationSchema::is_known_table(table) {
            return Err(DatabaseError::InvalidInput(format!("Unknown table: {}", table)));
        }
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
            .map_err(|e| DatabaseError::QueryFailed(format!("Count failed: {}", e)))?;
        Ok(count.max(0) as u64)
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        let conn = self.lock()?;
        let one: i32 = conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .map_err(|e| DatabaseError::QueryFailed(format!("Health check failed: {}", e)))?;
        Ok(one == 1)
    }

    fn backend_type(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnData, PetType};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn pet_types(rows: &[(&str, Uuid)]) -> TableData {
        let rows: Vec<PetType> = rows
            .iter()
            .map(|(name, id)| PetType {
                type_id: *id,
                type_name: name.to_string(),
            })
            .collect();
        TableData::from_pet_types(&rows)
    }

    #[tokio::test]
    async fn test_in_memory_database() {
        let destination = DuckDBDestination::in_memory().unwrap();
        assert!(destination.is_in_memory());
        assert!(destination.db_path().is_none());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let destination = DuckDBDestination::in_memory().unwrap();
        destination.initialize().await.unwrap();
        destination.initialize().await.unwrap();
        for table in DestinationSchema::TABLES {
            assert_eq!(destination.count_rows(table).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let destination = DuckDBDestination::in_memory().unwrap();
        assert!(destination.health_check().await.unwrap());
        assert_eq!(destination.backend_type(), "duckdb");
    }

    #[tokio::test]
    async fn test_upsert_overwrites_non_key_columns() {
        let destination = DuckDBDestination::in_memory().unwrap();
        destination.initialize().await.unwrap();
        let id = Uuid::new_v4();

        destination
            .upsert(CleanTable::PetTypes, &pet_types(&[("Dog", id)]))
            .await
            .unwrap();
        destination
            .upsert(CleanTable::PetTypes, &pet_types(&[("Canine", id)]))
            .await
            .unwrap();

        assert_eq!(destination.count_rows("pet_types").await.unwrap(), 1);
        let conn = destination.lock().unwrap();
        let name: String = conn
            .query_row("SELECT \"type\" FROM pet_types", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "Canine");
    }

    #[tokio::test]
    async fn test_upsert_casts_typed_columns() {
        let destination = DuckDBDestination::in_memory().unwrap();
        destination.initialize().await.unwrap();

        let mut columns: Vec<ColumnData> = CleanTable::Animals
            .columns()
            .iter()
            .map(|def| ColumnData::new(def.name, vec![None]))
            .collect();
        let set = |columns: &mut Vec<ColumnData>, name: &str, value: &str| {
            if let Some(c) = columns.iter_mut().find(|c| c.name == name) {
                c.values[0] = Some(value.to_string());
            }
        };
        set(&mut columns, "pet_id", "p1");
        set(&mut columns, "age", "3000000000");
        set(&mut columns, "adopted_date", "2025-06-01");
        set(&mut columns, "type_id", &Uuid::new_v4().to_string());
        set(&mut columns, "snapshot_file", "animals_snapshot_20250601_000000.csv");

        let data = TableData::new(columns).unwrap();
        assert_eq!(destination.upsert(CleanTable::Animals, &data).await.unwrap(), 1);

        let conn = destination.lock().unwrap();
        let (age, adopted): (i64, String) = conn
            .query_row(
                "SELECT age, CAST(adopted_date AS VARCHAR) FROM animals WHERE pet_id = 'p1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(age, 3_000_000_000);
        assert_eq!(adopted, "2025-06-01");
    }

    #[tokio::test]
    async fn test_upsert_pages_large_tables() {
        let destination = DuckDBDestination::in_memory().unwrap();
        destination.initialize().await.unwrap();

        let rows: Vec<(String, Uuid)> = (0..2500)
            .map(|i| (format!("Type {}", i), Uuid::new_v4()))
            .collect();
        let rows: Vec<(&str, Uuid)> = rows.iter().map(|(n, id)| (n.as_str(), *id)).collect();
        let written = destination
            .upsert(CleanTable::PetTypes, &pet_types(&rows))
            .await
            .unwrap();
        assert_eq!(written, 2500);
        assert_eq!(destination.count_rows("pet_types").await.unwrap(), 2500);
    }

    #[tokio::test]
    async fn test_ledger_insert_conflict() {
        let destination = DuckDBDestination::in_memory().unwrap();
        destination.ensure_ledger().await.unwrap();
        let entry = SnapshotLedgerEntry::new(
            "animals_snapshot_20250601_000000.csv",
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        );

        assert!(!destination.snapshot_loaded(&entry.snapshot_file).await.unwrap());
        assert_eq!(
            destination.insert_ledger_entry(&entry).await.unwrap(),
            LedgerInsert::Inserted
        );
        assert_eq!(
            destination.insert_ledger_entry(&entry).await.unwrap(),
            LedgerInsert::Conflict
        );
        assert!(destination.snapshot_loaded(&entry.snapshot_file).await.unwrap());

        let entries = destination.ledger_entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].snapshot_date, entry.snapshot_date);
    }

    #[tokio::test]
    async fn test_count_rows_rejects_unknown_table() {
        let destination = DuckDBDestination::in_memory().unwrap();
        let result = destination.count_rows("information_schema.tables").await;
        assert!(matches!(result, Err(DatabaseError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dest.duckdb");
        {
            let destination = DuckDBDestination::new(&path).unwrap();
            destination.initialize().await.unwrap();
            destination
                .upsert(CleanTable::PetTypes, &pet_types(&[("Dog", Uuid::new_v4())]))
                .await
                .unwrap();
        }
        let reopened = DuckDBDestination::new(&path).unwrap();
        assert_eq!(reopened.count_rows("pet_types").await.unwrap(), 1);
    }
}
