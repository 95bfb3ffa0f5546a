//! PostgreSQL destination implementation
//!
//! The shared relational store the incremental loader targets in
//! production. Connection parameters come from an explicit
//! [`DestinationConfig`].

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;

use super::config::DestinationConfig;
use super::schema::DestinationSchema;
use super::{
    DatabaseError, DatabaseResult, Destination, LedgerInsert, UPSERT_PAGE_SIZE,
    ledger_entry_from_text,
};
use crate::models::{CleanTable, SnapshotLedgerEntry, TableData};

/// PostgreSQL destination
pub struct PostgresDestination {
    /// Masked connection description for logs
    description: String,
    /// PostgreSQL client (wrapped for async access)
    client: Arc<Mutex<tokio_postgres::Client>>,
}

impl PostgresDestination {
    /// Connect to PostgreSQL
    ///
    /// # Arguments
    /// * `config` - Connection parameters, password included
    ///
    /// # Returns
    /// A connected destination; the connection task runs on the tokio runtime
    pub async fn connect(config: &DestinationConfig) -> DatabaseResult<Self> {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .dbname(&config.dbname)
            .user(&config.user)
            .password(&config.password);

        let description = config.connection_string_masked();
        let (client, connection) = pg_config
            .connect(tokio_postgres::NoTls)
            .await
            .map_err(|e| {
                DatabaseError::ConnectionFailed(format!(
                    "Failed to connect to PostgreSQL at {}: {}",
                    description, e
                ))
            })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });

        tracing::info!(destination = %description, "Connected to PostgreSQL");

        Ok(Self {
            description,
            client: Arc::new(Mutex::new(client)),
        })
    }

    /// Get the connection string (masked for security)
    pub fn connection_string_masked(&self) -> &str {
        &self.description
    }
}

fn text_params(values: &[Option<String>]) -> Vec<&(dyn ToSql + Sync)> {
    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

#[async_trait(?Send)]
impl Destination for PostgresDestination {
    async fn initialize(&self) -> DatabaseResult<()> {
        let client = self.client.lock().await;
        client
            .batch_execute(&DestinationSchema::create_tables_sql(true))
            .await
            .map_err(|e| {
                DatabaseError::MigrationFailed(format!("Failed to create tables: {}", e))
            })?;
        client
            .batch_execute(DestinationSchema::create_ledger_sql())
            .await
            .map_err(|e| {
                DatabaseError::MigrationFailed(format!("Failed to create ledger: {}", e))
            })?;
        tracing::info!(backend = "postgres", "Destination tables ensured");
        Ok(())
    }

    async fn ensure_ledger(&self) -> DatabaseResult<()> {
        let client = self.client.lock().await;
        client
            .batch_execute(DestinationSchema::create_ledger_sql())
            .await
            .map_err(|e| DatabaseError::MigrationFailed(format!("Failed to create ledger: {}", e)))
    }

    async fn upsert(&self, table: CleanTable, data: &TableData) -> DatabaseResult<usize> {
        let mut client = self.client.lock().await;
        let tx = client.transaction().await.map_err(|e| {
            DatabaseError::TransactionFailed(format!("Failed to begin transaction: {}", e))
        })?;

        let mut written = 0u64;
        for page in data.pages(UPSERT_PAGE_SIZE) {
            let sql = DestinationSchema::upsert_sql(table, page.len());
            let values = data.row_params(page.clone());
            tracing::debug!(table = %table, rows = page.len(), "Upserting page");
            written += tx.execute(&sql, &text_params(&values)).await.map_err(|e| {
                DatabaseError::QueryFailed(format!("Upsert into {} failed: {}", table, e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            DatabaseError::TransactionFailed(format!("Failed to commit {}: {}", table, e))
        })?;

        Ok(written as usize)
    }

    async fn snapshot_loaded(&self, snapshot_file: &str) -> DatabaseResult<bool> {
        let client = self.client.lock().await;
        let row = client
            .query_opt(DestinationSchema::snapshot_loaded_sql(), &[&snapshot_file])
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Ledger lookup failed: {}", e)))?;
        Ok(row.is_some())
    }

    async fn insert_ledger_entry(
        &self,
        entry: &SnapshotLedgerEntry,
    ) -> DatabaseResult<LedgerInsert> {
        let client = self.client.lock().await;
        let date = entry.snapshot_date.to_string();
        let result = client
            .execute(
                DestinationSchema::insert_ledger_sql(),
                &[&entry.snapshot_file, &date],
            )
            .await;

        match result {
            Ok(_) => Ok(LedgerInsert::Inserted),
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => Ok(LedgerInsert::Conflict),
            Err(e) => Err(DatabaseError::QueryFailed(format!(
                "Ledger insert failed: {}",
                e
            ))),
        }
    }

    async fn ledger_entries(&self) -> DatabaseResult<Vec<SnapshotLedgerEntry>> {
        let client = self.client.lock().await;
        let rows = client
            .query(DestinationSchema::ledger_entries_sql(), &[])
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Ledger query failed: {}", e)))?;

        rows.iter()
            .map(|row| {
                let file: String = row
                    .try_get(0)
                    .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
                let date: String = row
                    .try_get(1)
                    .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
                let loaded_at: Option<String> = row
                    .try_get(2)
                    .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
                ledger_entry_from_text(file, &date, loaded_at.as_deref())
            })
            .collect()
    }

    async fn count_rows(&self, table: &str) -> DatabaseResult<u64> {
        if !DestinationSchema::is_known_table(table) {
            return Err(DatabaseError::InvalidInput(format!("Unknown table: {}", table)));
        }
        let client = self.client.lock().await;
        let row = client
            .query_one(&format!("SELECT COUNT(*) FROM {}", table), &[])
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Count failed: {}", e)))?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
        Ok(count.max(0) as u64)
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        let client = self.client.lock().await;
        let row = client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| DatabaseError::QueryFailed(format!("Health check failed: {}", e)))?;
        let one: i32 = row
            .try_get(0)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
        Ok(one == 1)
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_params_preserve_nulls() {
        let values = vec![Some("a".to_string()), None];
        assert_eq!(text_params(&values).len(), 2);
    }
}
