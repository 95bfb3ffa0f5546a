//! Destination schema definitions
//!
//! Provides SQL that works with both DuckDB and PostgreSQL. Table DDL is
//! generated from the clean table layouts so the destination and the
//! intermediate files cannot drift apart.

use crate::models::{CleanTable, ColumnKind};

/// Ledger table name
pub const LEDGER_TABLE: &str = "loaded_snapshots";

/// Destination schema helper
pub struct DestinationSchema;

impl DestinationSchema {
    /// Every table the destination holds
    pub const TABLES: [&'static str; 5] =
        ["pet_types", "breeds", "shelters", "animals", LEDGER_TABLE];

    /// Whether `name` is a destination table
    pub fn is_known_table(name: &str) -> bool {
        Self::TABLES.contains(&name)
    }

    /// Foreign keys of a clean table, as (column, referenced table)
    pub fn foreign_keys(table: CleanTable) -> &'static [(&'static str, CleanTable)] {
        match table {
            CleanTable::PetTypes | CleanTable::Shelters => &[],
            CleanTable::Breeds => &[("type_id", CleanTable::PetTypes)],
            CleanTable::Animals => &[
                ("type_id", CleanTable::PetTypes),
                ("breed_id", CleanTable::Breeds),
                ("shelter_id", CleanTable::Shelters),
            ],
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` for one clean table
    ///
    /// DuckDB rejects `ON CONFLICT DO UPDATE` on rows that are referenced
    /// by a foreign key, so its destination is created without them.
    pub fn create_table_sql(table: CleanTable, with_foreign_keys: bool) -> String {
        let key = table.conflict_key();
        let columns = table
            .columns()
            .iter()
            .map(|def| {
                let mut column = format!("    \"{}\" {}", def.name, def.kind.sql_type());
                if key == [def.name] {
                    column.push_str(" PRIMARY KEY");
                }
                if with_foreign_keys
                    && let Some((_, parent)) = Self::foreign_keys(table)
                        .iter()
                        .find(|(name, _)| *name == def.name)
                {
                    column.push_str(&format!(
                        " REFERENCES {}({})",
                        parent.name(),
                        parent.conflict_key().join(", ")
                    ));
                }
                column
            })
            .collect::<Vec<_>>()
            .join(",\n");

        format!("CREATE TABLE IF NOT EXISTS {} (\n{}\n);\n", table.name(), columns)
    }

    /// DDL for the four clean tables, parents first
    pub fn create_tables_sql(with_foreign_keys: bool) -> String {
        CleanTable::LOAD_ORDER
            .iter()
            .map(|table| Self::create_table_sql(*table, with_foreign_keys))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// DDL for the snapshot ledger
    pub fn create_ledger_sql() -> &'static str {
        r#"
CREATE TABLE IF NOT EXISTS loaded_snapshots (
    snapshot_file TEXT PRIMARY KEY,
    snapshot_date DATE NOT NULL,
    loaded_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#
    }

    /// Multi-row upsert for `rows` rows of `table`
    ///
    /// Parameters are numbered row-major (`$1..$n` for the first row, and
    /// so on) and bound as text; every column is cast to its declared type.
    pub fn upsert_sql(table: CleanTable, rows: usize) -> String {
        let columns = table.columns();
        let column_list = columns
            .iter()
            .map(|def| format!("\"{}\"", def.name))
            .collect::<Vec<_>>()
            .join(", ");

        let values = (0..rows)
            .map(|row| {
                let params = columns
                    .iter()
                    .enumerate()
                    .map(|(i, def)| {
                        let n = row * columns.len() + i + 1;
                        match def.kind {
                            ColumnKind::Text => format!("${}::TEXT", n),
                            kind => format!("CAST(${}::TEXT AS {})", n, kind.sql_type()),
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({})", params)
            })
            .collect::<Vec<_>>()
            .join(", ");

        let key = table.conflict_key();
        let updates = columns
            .iter()
            .filter(|def| !key.contains(&def.name))
            .map(|def| format!("\"{}\" = EXCLUDED.\"{}\"", def.name, def.name))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) DO UPDATE SET {}",
            table.name(),
            column_list,
            values,
            key.join(", "),
            updates
        )
    }

    /// Ledger insert; a second insert of the same file violates the primary key
    pub fn insert_ledger_sql() -> &'static str {
        "INSERT INTO loaded_snapshots (snapshot_file, snapshot_date) \
         VALUES ($1, CAST($2::TEXT AS DATE))"
    }

    /// Ledger lookup by snapshot file
    pub fn snapshot_loaded_sql() -> &'static str {
        "SELECT 1 FROM loaded_snapshots WHERE snapshot_file = $1 LIMIT 1"
    }

    /// Ledger listing with dates rendered as text
    pub fn ledger_entries_sql() -> &'static str {
        "SELECT snapshot_file, CAST(snapshot_date AS VARCHAR), CAST(loaded_at AS VARCHAR) \
         FROM loaded_snapshots ORDER BY loaded_at, snapshot_file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_sql_with_foreign_keys() {
        let sql = DestinationSchema::create_table_sql(CleanTable::Animals, true);
        assert!(sql.contains("\"pet_id\" TEXT PRIMARY KEY"));
        assert!(sql.contains("\"age\" BIGINT"));
        assert!(sql.contains("\"breed_id\" UUID REFERENCES breeds(breed_id)"));
        assert!(sql.contains("\"shelter_id\" UUID REFERENCES shelters(shelter_id)"));
    }

    #[test]
    fn test_create_table_sql_without_foreign_keys() {
        let sql = DestinationSchema::create_table_sql(CleanTable::Breeds, false);
        assert!(sql.contains("\"breed_id\" UUID PRIMARY KEY"));
        assert!(!sql.contains("REFERENCES"));
    }

    #[test]
    fn test_tables_created_parents_first() {
        let sql = DestinationSchema::create_tables_sql(true);
        let pet_types = sql.find("pet_types (").unwrap();
        let breeds = sql.find("breeds (").unwrap();
        let animals = sql.find("animals (").unwrap();
        assert!(pet_types < breeds && breeds < animals);
    }

    #[test]
    fn test_upsert_sql() {
        let sql = DestinationSchema::upsert_sql(CleanTable::PetTypes, 2);
        assert_eq!(
            sql,
            "INSERT INTO pet_types (\"type\", \"type_id\") VALUES \
             ($1::TEXT, CAST($2::TEXT AS UUID)), ($3::TEXT, CAST($4::TEXT AS UUID)) \
             ON CONFLICT (type_id) DO UPDATE SET \"type\" = EXCLUDED.\"type\""
        );
    }

    #[test]
    fn test_upsert_sql_never_updates_key() {
        let sql = DestinationSchema::upsert_sql(CleanTable::Animals, 1);
        assert!(!sql.contains("\"pet_id\" = EXCLUDED"));
        assert!(sql.contains("\"snapshot_file\" = EXCLUDED.\"snapshot_file\""));
        assert!(sql.contains("CAST($3::TEXT AS BIGINT)"));
        assert!(sql.contains("$13"));
        assert!(!sql.contains("$14"));
    }

    #[test]
    fn test_known_tables() {
        assert!(DestinationSchema::is_known_table("animals"));
        assert!(DestinationSchema::is_known_table("loaded_snapshots"));
        assert!(!DestinationSchema::is_known_table("animals; DROP TABLE animals"));
    }
}
