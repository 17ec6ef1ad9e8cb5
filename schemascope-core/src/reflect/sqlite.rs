//! SQLite schema reflector.
//!
//! Introspection goes through `sqlite_master` and the PRAGMA table
//! functions. SQLite's "schemas" are attached databases (`main`, `temp`,
//! plus anything ATTACHed), so the schema-existence check reads
//! `PRAGMA database_list`.
//!
//! A single connection is sufficient; the pool is capped at one.

use super::SchemaReflector;
use crate::config::ConnectionConfig;
use crate::dialect::Dialect;
use crate::models::{
    ColumnDescriptor, ForeignKeyRef, SchemaSnapshot, TableDescriptor, TableSample,
};
use crate::{Result, error::Error};
use async_trait::async_trait;
use base64::Engine as _;
use serde_json::Value as JsonValue;
use sqlx::{Row, SqlitePool};

/// SQLite reflector over a file-based or in-memory database.
pub struct SqliteReflector {
    /// Connection pool (single connection; public for test seeding)
    pub pool: SqlitePool,
    /// Connection configuration
    pub config: ConnectionConfig,
}

impl SqliteReflector {
    /// Opens the database named by the configuration.
    ///
    /// File-based databases are opened read-only when the configuration
    /// asks for it; a missing file is a connection error (the reflector
    /// never creates databases).
    pub async fn new(config: ConnectionConfig) -> Result<Self> {
        use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
        use std::str::FromStr;

        let url = config.url()?;
        let is_in_memory = url.contains(":memory:");

        let mut options = SqliteConnectOptions::from_str(&url).map_err(|e| {
            Error::configuration(format!("Invalid SQLite connection string: {}", e))
        })?;

        if config.read_only && !is_in_memory {
            options = options.read_only(true);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await
            .map_err(|e| Error::connection_failed("Failed to open SQLite database", e))?;

        Ok(Self { pool, config })
    }

    /// Enumerates attached database names (`main`, `temp`, ...).
    async fn attached_schemas(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("PRAGMA database_list")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::reflection_failed("Failed to list attached databases", e))?;

        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row
                .try_get("name")
                .map_err(|e| Error::reflection_failed("Failed to parse database name", e))?;
            names.push(name);
        }
        Ok(names)
    }

    /// Collects columns and the primary key from one `table_info` pass.
    ///
    /// The pragma's `pk` field holds the 1-based position of a column within
    /// the primary key, 0 for columns outside it.
    async fn collect_table_structure(
        &self,
        schema: &str,
        table: &str,
    ) -> Result<(Vec<ColumnDescriptor>, Vec<String>)> {
        let columns_query = format!(
            "PRAGMA {}.table_info('{}')",
            quote(schema),
            escape_literal(table)
        );

        let column_rows = sqlx::query(&columns_query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::reflection_failed(
                    format!("Failed to collect columns for table '{}.{}'", schema, table),
                    e,
                )
            })?;

        let mut columns = Vec::with_capacity(column_rows.len());
        let mut pk_columns: Vec<(i32, String)> = Vec::new();

        for row in &column_rows {
            let cid: i32 = row.try_get("cid").unwrap_or(0);
            let name: String = row.try_get("name").unwrap_or_default();
            let sql_type: String = row.try_get("type").unwrap_or_default();
            let notnull: i32 = row.try_get("notnull").unwrap_or(0);
            let default_value: Option<String> = row.try_get("dflt_value").ok();
            let pk: i32 = row.try_get("pk").unwrap_or(0);

            if pk > 0 {
                pk_columns.push((pk, name.clone()));
            }

            // PRIMARY KEY columns are implicitly NOT NULL in SQLite even
            // when PRAGMA reports notnull = 0
            columns.push(ColumnDescriptor {
                name,
                sql_type,
                is_nullable: notnull == 0 && pk == 0,
                default_value,
                ordinal_position: u32::try_from(cid).unwrap_or(0).saturating_add(1),
            });
        }

        pk_columns.sort_by_key(|(pk, _)| *pk);
        let primary_key = pk_columns.into_iter().map(|(_, name)| name).collect();

        Ok((columns, primary_key))
    }

    async fn collect_foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyRef>> {
        let fk_query = format!(
            "PRAGMA {}.foreign_key_list('{}')",
            quote(schema),
            escape_literal(table)
        );

        let fk_rows = sqlx::query(&fk_query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::reflection_failed(
                    format!(
                        "Failed to collect foreign keys for table '{}.{}'",
                        schema, table
                    ),
                    e,
                )
            })?;

        // (id, seq) orders composite keys; SQLite does not name constraints
        let mut keyed: Vec<(i32, i32, ForeignKeyRef)> = Vec::with_capacity(fk_rows.len());
        for row in fk_rows {
            let id: i32 = row.try_get("id").unwrap_or(0);
            let seq: i32 = row.try_get("seq").unwrap_or(0);
            let referenced_table: String = row.try_get("table").unwrap_or_default();
            let column: String = row.try_get("from").unwrap_or_default();
            let referenced_column: Option<String> = row.try_get("to").ok().flatten();

            keyed.push((
                id,
                seq,
                ForeignKeyRef {
                    constraint_name: None,
                    column,
                    referenced_table,
                    referenced_column,
                },
            ));
        }

        keyed.sort_by_key(|(id, seq, _)| (*id, *seq));
        Ok(keyed.into_iter().map(|(_, _, fk)| fk).collect())
    }
}

#[async_trait]
impl SchemaReflector for SqliteReflector {
    async fn test_connection(&self) -> Result<()> {
        let connectivity: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::connection_failed("Basic connectivity test failed", e))?;

        if connectivity != 1 {
            return Err(Error::configuration(
                "Basic connectivity test failed: unexpected result",
            ));
        }

        // sqlite_master must be readable for reflection to work at all
        let _: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::reflection_failed("Cannot access sqlite_master", e))?;

        Ok(())
    }

    async fn reflect_schema(&self, schema: &str) -> Result<SchemaSnapshot> {
        let attached = self.attached_schemas().await?;
        if !attached.iter().any(|name| name == schema) {
            return Err(Error::schema_not_found(schema));
        }

        tracing::debug!("Enumerating tables in SQLite schema '{}'", schema);

        let tables_query = format!(
            "SELECT name FROM {}.sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            quote(schema)
        );

        let table_rows = sqlx::query(&tables_query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::reflection_failed(
                    format!("Failed to enumerate tables in schema '{}'", schema),
                    e,
                )
            })?;

        let mut tables = Vec::with_capacity(table_rows.len());
        for row in &table_rows {
            let table_name: String = row
                .try_get("name")
                .map_err(|e| Error::reflection_failed("Failed to parse table name", e))?;

            let (columns, primary_key) = self.collect_table_structure(schema, &table_name).await?;
            let foreign_keys = self.collect_foreign_keys(schema, &table_name).await?;

            tracing::debug!(
                "Reflected table '{}' with {} columns, {} key columns, {} foreign keys",
                table_name,
                columns.len(),
                primary_key.len(),
                foreign_keys.len()
            );

            tables.push(TableDescriptor {
                name: table_name,
                columns,
                primary_key,
                foreign_keys,
            });
        }

        tracing::info!(
            "Reflected {} tables from SQLite schema '{}'",
            tables.len(),
            schema
        );

        Ok(SchemaSnapshot {
            schema: schema.to_string(),
            dialect: Dialect::Sqlite,
            tables,
            reflected_at: chrono::Utc::now(),
        })
    }

    async fn sample_table(
        &self,
        schema: &str,
        table: &TableDescriptor,
        limit: u32,
    ) -> Result<TableSample> {
        let columns = table.column_names();
        let select_list = columns
            .iter()
            .map(|c| quote(c))
            .collect::<Vec<_>>()
            .join(", ");

        let sample_query = format!(
            "SELECT {} FROM {}.{} LIMIT ?",
            select_list,
            quote(schema),
            quote(&table.name)
        );

        let rows = sqlx::query(&sample_query)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::reflection_failed(
                    format!("Failed to sample table '{}.{}'", schema, table.name),
                    e,
                )
            })?;

        let mut json_rows = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut map = serde_json::Map::new();
            for column in &columns {
                map.insert(column.clone(), extract_column_value(row, column));
            }
            json_rows.push(JsonValue::Object(map));
        }

        Ok(TableSample {
            table: table.name.clone(),
            schema: schema.to_string(),
            columns,
            rows: json_rows,
        })
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

fn quote(ident: &str) -> String {
    Dialect::Sqlite.quote_ident(ident)
}

fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}

/// Extracts a column value as a JSON scalar.
///
/// SQLite is dynamically typed, so decoding is tried in order of
/// likelihood; BLOBs are base64-encoded.
fn extract_column_value(row: &sqlx::sqlite::SqliteRow, column_name: &str) -> JsonValue {
    if let Ok(v) = row.try_get::<Option<String>, _>(column_name) {
        return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(column_name) {
        return v
            .map(|n| JsonValue::Number(n.into()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(column_name) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(column_name) {
        return v.map(JsonValue::Bool).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(column_name) {
        return v
            .map(|bytes| JsonValue::String(base64::engine::general_purpose::STANDARD.encode(bytes)))
            .unwrap_or(JsonValue::Null);
    }
    JsonValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal("users"), "users");
        assert_eq!(escape_literal("o'brien"), "o''brien");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("main"), "\"main\"");
        assert_eq!(quote("odd\"name"), "\"odd\"\"name\"");
    }
}
