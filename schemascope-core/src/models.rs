//! Data model for reflected schemas and row samples.
//!
//! Everything here is derived from the live database catalog at reflection
//! time; nothing is cached or versioned across runs.

use crate::dialect::Dialect;
use serde::{Deserialize, Serialize};

/// The result of one reflection pass over one named schema.
///
/// Tables are held in enumeration order (alphabetical by name), which is
/// also the order the exporter emits DDL in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Schema name as known to the database
    pub schema: String,
    /// Dialect the snapshot was reflected from
    pub dialect: Dialect,
    /// Table descriptors in enumeration order
    pub tables: Vec<TableDescriptor>,
    /// When reflection ran
    pub reflected_at: chrono::DateTime<chrono::Utc>,
}

impl SchemaSnapshot {
    /// True when the schema exists but holds no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// One table's reflected structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    /// Columns in ordinal order
    pub columns: Vec<ColumnDescriptor>,
    /// Primary-key column names in key order; empty when the table has no
    /// primary key
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyRef>,
}

impl TableDescriptor {
    /// Column names in declared order, as used for CSV headers.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// One reflected column.
///
/// `sql_type` is the dialect-native type spelling straight from the catalog
/// (`character varying(50)`, `int(11)`, `TEXT`, ...), so emitted DDL
/// reproduces the source types verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub sql_type: String,
    pub is_nullable: bool,
    /// Default expression as the catalog reports it; reflected for
    /// completeness, not re-emitted in DDL
    pub default_value: Option<String>,
    pub ordinal_position: u32,
}

/// One column of a foreign-key constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Constraint name when the engine names it
    pub constraint_name: Option<String>,
    pub column: String,
    pub referenced_table: String,
    /// Absent when the engine lets the reference default to the target's
    /// primary key (SQLite allows this)
    pub referenced_column: Option<String>,
}

/// A bounded row sample from one table.
///
/// Rows are JSON objects keyed by column name, in database-default order
/// (no `ORDER BY` is issued). Binary values arrive base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSample {
    pub table: String,
    pub schema: String,
    /// Column names in declared order; the CSV header
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Value>,
}
