//! Column metadata used for type-aware value quoting.
//!
//! Loading fixtures never requires a schema. When one is available (from a
//! YAML schema file, or from a custom resolver) the sink uses the declared
//! column types to render values, e.g. to keep `'1'` from a CSV cell unquoted
//! for an integer column.
//!
//! ## YAML format
//!
//! ```yaml
//! tables:
//!   - name: sites
//!     entity: Site
//!     primary_key: id
//!     columns:
//!       - name: id
//!         type: integer
//!       - name: name
//!         type: varchar
//!         nullable: true
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// Error Types
// ============================================================================

/// Error type for schema operations.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Error reading schema file
    #[error("Failed to read schema file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error parsing YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Table not found in schema
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Column not found in table schema
    #[error("Column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },
}

// ============================================================================
// Column Types
// ============================================================================

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    Decimal,
    Text,
    Date,
    Time,
    Timestamp,
    Json,
    Binary,
}

impl ColumnType {
    /// Whether values of this type are rendered as bare numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Decimal)
    }

    /// Whether values of this type are dates or times.
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Date | Self::Time | Self::Timestamp)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Date => "date",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
            Self::Json => "json",
            Self::Binary => "binary",
        }
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(Self::Boolean),
            "int" | "integer" | "smallint" | "small_int" | "bigint" | "big_int" | "serial"
            | "bigserial" => Ok(Self::Integer),
            "float" | "double" | "real" => Ok(Self::Float),
            "decimal" | "numeric" => Ok(Self::Decimal),
            "text" | "string" | "char" | "varchar" | "var_char" | "uuid" => Ok(Self::Text),
            "date" => Ok(Self::Date),
            "time" => Ok(Self::Time),
            "timestamp" | "datetime" | "date_time" | "timestamptz" | "timestamp_tz" => {
                Ok(Self::Timestamp)
            }
            "json" | "jsonb" => Ok(Self::Json),
            "binary" | "blob" | "bytea" | "bytes" => Ok(Self::Binary),
            _ => Err(format!("unknown column type: {value}")),
        }
    }
}

impl TryFrom<String> for ColumnType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Column definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,

    /// Column type
    #[serde(rename = "type")]
    pub column_type: ColumnType,

    /// Whether this column is nullable
    #[serde(default)]
    pub nullable: bool,
}

impl ColumnInfo {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
        }
    }

    /// Create a new nullable column definition.
    pub fn nullable(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
        }
    }
}

fn default_primary_key() -> String {
    "id".to_string()
}

/// Column metadata for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name
    pub name: String,

    /// Entity name the table belongs to, when it differs from the default
    #[serde(default)]
    pub entity: Option<String>,

    /// Primary key column name
    #[serde(default = "default_primary_key")]
    pub primary_key: String,

    /// Column definitions
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

impl TableSchema {
    /// Create a new table schema with an `id` primary key.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            name: name.into(),
            entity: None,
            primary_key: default_primary_key(),
            columns,
        }
    }

    /// Get a column by name.
    pub fn get_column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get the type of a column by name.
    pub fn get_column_type(&self, name: &str) -> Option<ColumnType> {
        self.get_column(name).map(|c| c.column_type)
    }

    /// Get all column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Column metadata for a set of tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Table definitions
    #[serde(default)]
    pub tables: Vec<TableSchema>,

    /// Cached table lookup (not serialized)
    #[serde(skip)]
    table_map: HashMap<String, usize>,
}

impl Schema {
    /// Create a new schema from a list of table definitions.
    pub fn new(tables: Vec<TableSchema>) -> Self {
        let mut schema = Self {
            tables,
            table_map: HashMap::new(),
        };
        schema.build_table_map();
        schema
    }

    /// Load schema from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse schema from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let mut schema: Schema = serde_yaml::from_str(yaml)?;
        schema.build_table_map();
        Ok(schema)
    }

    /// Build the internal table lookup map.
    fn build_table_map(&mut self) {
        self.table_map = self
            .tables
            .iter()
            .enumerate()
            .map(|(idx, table)| (table.name.clone(), idx))
            .collect();
    }

    /// Get a table schema by name.
    pub fn get_table(&self, name: &str) -> Option<&TableSchema> {
        self.table_map
            .get(name)
            .and_then(|&idx| self.tables.get(idx))
    }

    /// Get a table schema by the entity it belongs to.
    pub fn get_entity(&self, entity: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|t| t.entity.as_deref() == Some(entity))
    }

    /// Get the type of a column in a specific table.
    pub fn get_column_type(&self, table: &str, column: &str) -> Result<ColumnType, SchemaError> {
        let table_schema = self
            .get_table(table)
            .ok_or_else(|| SchemaError::TableNotFound(table.to_string()))?;

        table_schema
            .get_column_type(column)
            .ok_or_else(|| SchemaError::ColumnNotFound {
                table: table.to_string(),
                column: column.to_string(),
            })
    }

    /// Get all table names in the schema.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Add a table to the schema.
    pub fn add_table(&mut self, table: TableSchema) {
        let idx = self.tables.len();
        self.table_map.insert(table.name.clone(), idx);
        self.tables.push(table);
    }
}
