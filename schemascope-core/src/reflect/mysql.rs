//! MySQL schema reflector.
//!
//! MySQL's `information_schema` reports `COLUMN_TYPE` with the full native
//! spelling (`int(11)`, `varchar(50)`), so no type reassembly is needed.
//! Schemas and databases are the same level in MySQL; reflecting schema X
//! means reflecting database X.

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
use sqlx::{MySqlPool, Row};

/// MySQL reflector over a single-connection pool.
pub struct MySqlReflector {
    pool: MySqlPool,
    config: ConnectionConfig,
}

impl MySqlReflector {
    /// Connects to the server named by the configuration.
    pub async fn new(config: ConnectionConfig) -> Result<Self> {
        use sqlx::mysql::MySqlPoolOptions;

        let url = config.url()?;

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(config.connect_timeout)
            .connect(&url)
            .await
            .map_err(|e| {
                Error::connection_failed(
                    format!("Failed to connect to {}", crate::error::redact_database_url(&url)),
                    e,
                )
            })?;

        if config.read_only {
            sqlx::query("SET SESSION TRANSACTION READ ONLY")
                .execute(&pool)
                .await
                .map_err(|e| Error::connection_failed("Failed to set read-only session", e))?;
        }

        Ok(Self { pool, config })
    }

    async fn schema_exists(&self, schema: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?")
            .bind(schema)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::reflection_failed("Failed to query information_schema.schemata", e))?;
        Ok(row.is_some())
    }

    async fn collect_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let columns_query = r#"
            SELECT
                c.COLUMN_NAME,
                c.COLUMN_TYPE,
                c.IS_NULLABLE,
                c.COLUMN_DEFAULT,
                c.ORDINAL_POSITION
            FROM information_schema.COLUMNS c
            WHERE c.TABLE_SCHEMA = ?
            AND c.TABLE_NAME = ?
            ORDER BY c.ORDINAL_POSITION
        "#;

        let column_rows = sqlx::query(columns_query)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::reflection_failed(
                    format!("Failed to collect columns for table '{}.{}'", schema, table),
                    e,
                )
            })?;

        let mut columns = Vec::with_capacity(column_rows.len());
        for row in &column_rows {
            let name: String = get_field(row, "COLUMN_NAME", table)?;
            // COLUMN_TYPE carries the full native spelling; the remaining
            // catalog columns decode leniently because their exact types
            // differ across MySQL and MariaDB versions
            let sql_type: String = row.try_get("COLUMN_TYPE").unwrap_or_default();
            let is_nullable: String = row.try_get("IS_NULLABLE").unwrap_or_default();
            let column_default: Option<String> = row.try_get("COLUMN_DEFAULT").ok();
            let ordinal_position: i32 = row.try_get("ORDINAL_POSITION").unwrap_or(0);

            columns.push(ColumnDescriptor {
                name,
                sql_type,
                is_nullable: is_nullable == "YES",
                default_value: column_default,
                ordinal_position: u32::try_from(ordinal_position).unwrap_or(0),
            });
        }

        Ok(columns)
    }

    async fn collect_primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let pk_query = r#"
            SELECT kcu.COLUMN_NAME
            FROM information_schema.KEY_COLUMN_USAGE kcu
            WHERE kcu.TABLE_SCHEMA = ?
            AND kcu.TABLE_NAME = ?
            AND kcu.CONSTRAINT_NAME = 'PRIMARY'
            ORDER BY kcu.ORDINAL_POSITION
        "#;

        let pk_rows = sqlx::query(pk_query)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::reflection_failed(
                    format!(
                        "Failed to collect primary key for table '{}.{}'",
                        schema, table
                    ),
                    e,
                )
            })?;

        let mut columns = Vec::with_capacity(pk_rows.len());
        for row in &pk_rows {
            let name: String = get_field(row, "COLUMN_NAME", table)?;
            columns.push(name);
        }
        Ok(columns)
    }

    async fn collect_foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyRef>> {
        let fk_query = r#"
            SELECT
                kcu.CONSTRAINT_NAME,
                kcu.COLUMN_NAME,
                kcu.REFERENCED_TABLE_NAME,
                kcu.REFERENCED_COLUMN_NAME
            FROM information_schema.KEY_COLUMN_USAGE kcu
            WHERE kcu.TABLE_SCHEMA = ?
            AND kcu.TABLE_NAME = ?
            AND kcu.REFERENCED_TABLE_NAME IS NOT NULL
            ORDER BY kcu.CONSTRAINT_NAME, kcu.ORDINAL_POSITION
        "#;

        let fk_rows = sqlx::query(fk_query)
            .bind(schema)
            .bind(table)
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

        let mut foreign_keys = Vec::with_capacity(fk_rows.len());
        for row in &fk_rows {
            let constraint_name: String = get_field(row, "CONSTRAINT_NAME", table)?;
            let column: String = get_field(row, "COLUMN_NAME", table)?;
            let referenced_table: String = get_field(row, "REFERENCED_TABLE_NAME", table)?;
            let referenced_column: String = get_field(row, "REFERENCED_COLUMN_NAME", table)?;

            foreign_keys.push(ForeignKeyRef {
                constraint_name: Some(constraint_name),
                column,
                referenced_table,
                referenced_column: Some(referenced_column),
            });
        }

        Ok(foreign_keys)
    }
}

#[async_trait]
impl SchemaReflector for MySqlReflector {
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

        let _: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM information_schema.SCHEMATA")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::reflection_failed("Cannot access information_schema", e))?;

        Ok(())
    }

    async fn reflect_schema(&self, schema: &str) -> Result<SchemaSnapshot> {
        if !self.schema_exists(schema).await? {
            return Err(Error::schema_not_found(schema));
        }

        tracing::debug!("Enumerating tables in MySQL schema '{}'", schema);

        let tables_query = r#"
            SELECT t.TABLE_NAME
            FROM information_schema.TABLES t
            WHERE t.TABLE_SCHEMA = ?
            AND t.TABLE_TYPE = 'BASE TABLE'
            ORDER BY t.TABLE_NAME
        "#;

        let table_rows = sqlx::query(tables_query)
            .bind(schema)
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
                .try_get("TABLE_NAME")
                .map_err(|e| Error::reflection_failed("Failed to parse table name", e))?;

            let columns = self.collect_columns(schema, &table_name).await?;
            let primary_key = self.collect_primary_key(schema, &table_name).await?;
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
            "Reflected {} tables from MySQL schema '{}'",
            tables.len(),
            schema
        );

        Ok(SchemaSnapshot {
            schema: schema.to_string(),
            dialect: Dialect::MySql,
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
            .map(|c| Dialect::MySql.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        let sample_query = format!(
            "SELECT {} FROM {}.{} LIMIT ?",
            select_list,
            Dialect::MySql.quote_ident(schema),
            Dialect::MySql.quote_ident(&table.name)
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
        Dialect::MySql
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

/// Extracts a typed field from a row with table context in the error.
fn get_field<'r, T>(row: &'r sqlx::mysql::MySqlRow, field: &str, table: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
{
    row.try_get(field).map_err(|e| {
        Error::reflection_failed(
            format!("Failed to parse field '{}' for table '{}'", field, table),
            e,
        )
    })
}

/// Extracts a column value as a JSON scalar.
///
/// Decoding is tried in order of likelihood; temporal types render in their
/// natural text form and BLOBs are base64-encoded.
fn extract_column_value(row: &sqlx::mysql::MySqlRow, column_name: &str) -> JsonValue {
    if let Ok(v) = row.try_get::<Option<i64>, _>(column_name) {
        return v
            .map(|n| JsonValue::Number(n.into()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(column_name) {
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
    if let Ok(v) = row.try_get::<Option<String>, _>(column_name) {
        return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(column_name) {
        return v
            .map(|t| JsonValue::String(t.to_string()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(column_name) {
        return v
            .map(|d| JsonValue::String(d.to_string()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(column_name) {
        return v
            .map(|t| JsonValue::String(t.to_rfc3339()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(column_name) {
        return v
            .map(|bytes| JsonValue::String(base64::engine::general_purpose::STANDARD.encode(bytes)))
            .unwrap_or(JsonValue::Null);
    }
    JsonValue::Null
}
