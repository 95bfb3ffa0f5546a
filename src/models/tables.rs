//! Clean (intermediate) table layouts and their column-wise representation
//!
//! Every clean table moves between stages as a [`TableData`]: one text
//! column per field, each value already encoded in its canonical text form
//! (hyphenated UUIDs, ISO dates, decimal integers). Writers and destinations
//! cast text back to the declared [`ColumnKind`] in SQL, so type coercion
//! happens once per column instead of once per row.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

use super::{AnimalRecord, Breed, PetType, Shelter};

/// SQL type of a clean column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Text,
    Integer,
    Date,
    Uuid,
}

impl ColumnKind {
    /// SQL type name understood by both DuckDB and PostgreSQL
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnKind::Text => "TEXT",
            ColumnKind::Integer => "BIGINT",
            ColumnKind::Date => "DATE",
            ColumnKind::Uuid => "UUID",
        }
    }
}

/// Column of a clean table layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> ColumnDef {
    ColumnDef { name, kind }
}

const PET_TYPE_COLUMNS: &[ColumnDef] = &[
    col("type", ColumnKind::Text),
    col("type_id", ColumnKind::Uuid),
];

const BREED_COLUMNS: &[ColumnDef] = &[
    col("breed", ColumnKind::Text),
    col("breed_id", ColumnKind::Uuid),
    col("type_id", ColumnKind::Uuid),
];

const SHELTER_COLUMNS: &[ColumnDef] = &[
    col("shelter_name", ColumnKind::Text),
    col("city", ColumnKind::Text),
    col("state", ColumnKind::Text),
    col("shelter_id", ColumnKind::Uuid),
];

const ANIMAL_COLUMNS: &[ColumnDef] = &[
    col("pet_id", ColumnKind::Text),
    col("name", ColumnKind::Text),
    col("age", ColumnKind::Integer),
    col("gender", ColumnKind::Text),
    col("size", ColumnKind::Text),
    col("status", ColumnKind::Text),
    col("date_arrived", ColumnKind::Date),
    col("adopted_date", ColumnKind::Date),
    col("type_id", ColumnKind::Uuid),
    col("breed_id", ColumnKind::Uuid),
    col("shelter_id", ColumnKind::Uuid),
    col("snapshot_date", ColumnKind::Date),
    col("snapshot_file", ColumnKind::Text),
];

/// The four clean tables, in destination load order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanTable {
    PetTypes,
    Breeds,
    Shelters,
    Animals,
}

impl CleanTable {
    /// Dependency order: every table only references tables before it
    pub const LOAD_ORDER: [CleanTable; 4] = [
        CleanTable::PetTypes,
        CleanTable::Breeds,
        CleanTable::Shelters,
        CleanTable::Animals,
    ];

    /// Table and file stem name
    pub fn name(self) -> &'static str {
        match self {
            CleanTable::PetTypes => "pet_types",
            CleanTable::Breeds => "breeds",
            CleanTable::Shelters => "shelters",
            CleanTable::Animals => "animals",
        }
    }

    /// Column layout, in file order
    pub fn columns(self) -> &'static [ColumnDef] {
        match self {
            CleanTable::PetTypes => PET_TYPE_COLUMNS,
            CleanTable::Breeds => BREED_COLUMNS,
            CleanTable::Shelters => SHELTER_COLUMNS,
            CleanTable::Animals => ANIMAL_COLUMNS,
        }
    }

    /// Upsert conflict key (the destination primary key)
    pub fn conflict_key(self) -> &'static [&'static str] {
        match self {
            CleanTable::PetTypes => &["type_id"],
            CleanTable::Breeds => &["breed_id"],
            CleanTable::Shelters => &["shelter_id"],
            CleanTable::Animals => &["pet_id"],
        }
    }

    /// Look up a column definition by name
    pub fn column(self, name: &str) -> Option<ColumnDef> {
        self.columns().iter().copied().find(|c| c.name == name)
    }
}

impl std::fmt::Display for CleanTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// On-disk serialization of clean tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// Columnar binary (default)
    #[default]
    Parquet,
    /// Row-oriented text with a header row
    Csv,
}

impl TableFormat {
    /// File extension without the dot
    pub fn extension(self) -> &'static str {
        match self {
            TableFormat::Parquet => "parquet",
            TableFormat::Csv => "csv",
        }
    }
}

impl std::str::FromStr for TableFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "parquet" => Ok(TableFormat::Parquet),
            "csv" => Ok(TableFormat::Csv),
            _ => Err(format!("Unknown table format: {}. Use 'parquet' or 'csv'.", s)),
        }
    }
}

impl std::fmt::Display for TableFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// One text-encoded column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnData {
    pub name: String,
    pub values: Vec<Option<String>>,
}

impl ColumnData {
    pub fn new(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    fn encode<T, I>(name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = Option<T>>,
        T: ToString,
    {
        Self::new(
            name,
            values.into_iter().map(|v| v.map(|v| v.to_string())).collect(),
        )
    }
}

/// A clean table held column-wise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<ColumnData>,
}

impl TableData {
    /// Build from columns; every column must have the same length
    pub fn new(columns: Vec<ColumnData>) -> Result<Self, String> {
        if let Some(first) = columns.first() {
            let len = first.values.len();
            if let Some(bad) = columns.iter().find(|c| c.values.len() != len) {
                return Err(format!(
                    "Column '{}' has {} values, expected {}",
                    bad.name,
                    bad.values.len(),
                    len
                ));
            }
        }
        Ok(Self { columns })
    }

    /// Encode the `pet_types` dimension
    pub fn from_pet_types(rows: &[PetType]) -> Self {
        Self {
            columns: vec![
                ColumnData::encode("type", rows.iter().map(|r| Some(&r.type_name))),
                ColumnData::encode("type_id", rows.iter().map(|r| Some(r.type_id))),
            ],
        }
    }

    /// Encode the `breeds` dimension
    pub fn from_breeds(rows: &[Breed]) -> Self {
        Self {
            columns: vec![
                ColumnData::encode("breed", rows.iter().map(|r| Some(&r.breed))),
                ColumnData::encode("breed_id", rows.iter().map(|r| Some(r.breed_id))),
                ColumnData::encode("type_id", rows.iter().map(|r| r.type_id)),
            ],
        }
    }

    /// Encode the `shelters` dimension
    pub fn from_shelters(rows: &[Shelter]) -> Self {
        Self {
            columns: vec![
                ColumnData::encode("shelter_name", rows.iter().map(|r| r.shelter_name.as_ref())),
                ColumnData::encode("city", rows.iter().map(|r| r.city.as_ref())),
                ColumnData::encode("state", rows.iter().map(|r| r.state.as_ref())),
                ColumnData::encode("shelter_id", rows.iter().map(|r| Some(r.shelter_id))),
            ],
        }
    }

    /// Encode the `animals` fact table
    pub fn from_animals(rows: &[AnimalRecord]) -> Self {
        Self {
            columns: vec![
                ColumnData::encode("pet_id", rows.iter().map(|r| Some(&r.pet_id))),
                ColumnData::encode("name", rows.iter().map(|r| r.name.as_ref())),
                ColumnData::encode("age", rows.iter().map(|r| r.age)),
                ColumnData::encode("gender", rows.iter().map(|r| r.gender.as_ref())),
                ColumnData::encode("size", rows.iter().map(|r| r.size.as_ref())),
                ColumnData::encode("status", rows.iter().map(|r| r.status.as_ref())),
                ColumnData::encode("date_arrived", rows.iter().map(|r| r.date_arrived)),
                ColumnData::encode("adopted_date", rows.iter().map(|r| r.adopted_date)),
                ColumnData::encode("type_id", rows.iter().map(|r| r.type_id)),
                ColumnData::encode("breed_id", rows.iter().map(|r| r.breed_id)),
                ColumnData::encode("shelter_id", rows.iter().map(|r| r.shelter_id)),
                ColumnData::encode("snapshot_date", rows.iter().map(|r| r.snapshot_date)),
                ColumnData::encode("snapshot_file", rows.iter().map(|r| Some(&r.snapshot_file))),
            ],
        }
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Column names, in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Find a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Layout columns that are absent from this table
    pub fn missing_columns(&self, table: CleanTable) -> Vec<String> {
        table
            .columns()
            .iter()
            .filter(|def| self.column(def.name).is_none())
            .map(|def| def.name.to_string())
            .collect()
    }

    /// Distinct non-null values of a column, in first-seen order
    pub fn distinct_non_null(&self, name: &str) -> Vec<&str> {
        let mut seen = Vec::new();
        if let Some(column) = self.column(name) {
            for value in column.values.iter().flatten() {
                if !seen.contains(&value.as_str()) {
                    seen.push(value.as_str());
                }
            }
        }
        seen
    }

    /// Reorder to the layout of `table`, dropping any extra columns
    ///
    /// Returns the names of layout columns that are missing.
    pub fn project(&self, table: CleanTable) -> Result<TableData, Vec<String>> {
        let missing = self.missing_columns(table);
        if !missing.is_empty() {
            return Err(missing);
        }
        let columns = table
            .columns()
            .iter()
            .filter_map(|def| self.column(def.name).cloned())
            .collect();
        Ok(TableData { columns })
    }

    /// Keep only the last row for every value of `key`
    ///
    /// A destination upsert statement may not touch the same key twice, and
    /// last-write-wins is the upsert contract, so the later row survives.
    /// Row order is otherwise preserved.
    pub fn dedup_last_by(&self, key: &[&str]) -> TableData {
        let key_columns: Vec<&ColumnData> = key.iter().filter_map(|k| self.column(k)).collect();
        if key_columns.len() != key.len() {
            return self.clone();
        }

        let rows = self.row_count();
        let mut last_index: HashMap<Vec<Option<&str>>, usize> = HashMap::with_capacity(rows);
        for row in 0..rows {
            let key_value: Vec<Option<&str>> = key_columns
                .iter()
                .map(|c| c.values[row].as_deref())
                .collect();
            last_index.insert(key_value, row);
        }

        if last_index.len() == rows {
            return self.clone();
        }

        let mut keep: Vec<usize> = last_index.into_values().collect();
        keep.sort_unstable();

        TableData {
            columns: self
                .columns
                .iter()
                .map(|c| ColumnData {
                    name: c.name.clone(),
                    values: keep.iter().map(|&i| c.values[i].clone()).collect(),
                })
                .collect(),
        }
    }

    /// Row ranges of at most `page_size` rows
    pub fn pages(&self, page_size: usize) -> Vec<Range<usize>> {
        let rows = self.row_count();
        let page_size = page_size.max(1);
        (0..rows)
            .step_by(page_size)
            .map(|start| start..(start + page_size).min(rows))
            .collect()
    }

    /// Row-major parameter list for the rows in `range`
    pub fn row_params(&self, range: Range<usize>) -> Vec<Option<String>> {
        let mut params = Vec::with_capacity(range.len() * self.columns.len());
        for row in range {
            for column in &self.columns {
                params.push(column.values[row].clone());
            }
        }
        params
    }
}

/// The four clean tables of one transform run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanTables {
    pub pet_types: TableData,
    pub breeds: TableData,
    pub shelters: TableData,
    pub animals: TableData,
}

impl CleanTables {
    /// The table data for one clean table
    pub fn get(&self, table: CleanTable) -> &TableData {
        match table {
            CleanTable::PetTypes => &self.pet_types,
            CleanTable::Breeds => &self.breeds,
            CleanTable::Shelters => &self.shelters,
            CleanTable::Animals => &self.animals,
        }
    }
}
