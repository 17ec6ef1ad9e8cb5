//! PostgreSQL schema reflector.
//!
//! Table and column discovery goes through `information_schema`; foreign
//! keys come from `pg_constraint`, which keeps composite-key column pairing
//! correct. Sampling converts rows server-side with `row_to_json`, so no
//! per-type decoding is needed on the client.

use super::SchemaReflector;
use crate::config::ConnectionConfig;
use crate::dialect::Dialect;
use crate::models::{
    ColumnDescriptor, ForeignKeyRef, SchemaSnapshot, TableDescriptor, TableSample,
};
use crate::{Result, error::Error};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};

/// PostgreSQL reflector over a single-connection pool.
pub struct PostgresReflector {
    pool: PgPool,
    config: ConnectionConfig,
}

impl PostgresReflector {
    /// Connects to the server named by the configuration.
    pub async fn new(config: ConnectionConfig) -> Result<Self> {
        use sqlx::postgres::PgPoolOptions;

        let url = config.url()?;

        let pool = PgPoolOptions::new()
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
            sqlx::query("SET default_transaction_read_only = on")
                .execute(&pool)
                .await
                .map_err(|e| Error::connection_failed("Failed to set read-only session", e))?;
        }

        Ok(Self { pool, config })
    }

    async fn schema_exists(&self, schema: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM information_schema.schemata WHERE schema_name = $1")
            .bind(schema)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::reflection_failed("Failed to query information_schema.schemata", e))?;
        Ok(row.is_some())
    }

    async fn collect_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let columns_query = r#"
            SELECT
                c.column_name,
                c.data_type,
                c.udt_name,
                c.character_maximum_length,
                c.numeric_precision,
                c.numeric_scale,
                c.is_nullable,
                c.column_default,
                c.ordinal_position
            FROM information_schema.columns c
            WHERE c.table_schema = $1
            AND c.table_name = $2
            ORDER BY c.ordinal_position
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
            let name: String = get_field(row, "column_name", table)?;
            let data_type: String = get_field(row, "data_type", table)?;
            let udt_name: String = get_field(row, "udt_name", table)?;
            let character_maximum_length: Option<i32> =
                get_field(row, "character_maximum_length", table)?;
            let numeric_precision: Option<i32> = get_field(row, "numeric_precision", table)?;
            let numeric_scale: Option<i32> = get_field(row, "numeric_scale", table)?;
            let is_nullable: String = get_field(row, "is_nullable", table)?;
            let column_default: Option<String> = get_field(row, "column_default", table)?;
            let ordinal_position: i32 = get_field(row, "ordinal_position", table)?;

            let sql_type = format_type(
                &data_type,
                &udt_name,
                character_maximum_length,
                numeric_precision,
                numeric_scale,
            );

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
            SELECT string_agg(kcu.column_name, ',' ORDER BY kcu.ordinal_position) as columns
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.constraint_type = 'PRIMARY KEY'
            AND tc.table_name = $1
            AND tc.table_schema = $2
            GROUP BY tc.constraint_name
        "#;

        let pk_row = sqlx::query(pk_query)
            .bind(table)
            .bind(schema)
            .fetch_optional(&self.pool)
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

        match pk_row {
            Some(row) => {
                let columns_str: String = get_field(&row, "columns", table)?;
                Ok(columns_str.split(',').map(str::to_string).collect())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn collect_foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyRef>> {
        // pg_constraint keeps conkey/confkey aligned, which information_schema
        // alone cannot guarantee for composite keys
        let fk_query = r#"
            SELECT
                con.conname::text as constraint_name,
                a.attname::text as column_name,
                fcl.relname::text as referenced_table,
                fa.attname::text as referenced_column
            FROM pg_constraint con
            JOIN pg_class cl ON con.conrelid = cl.oid
            JOIN pg_namespace ns ON cl.relnamespace = ns.oid
            JOIN pg_class fcl ON con.confrelid = fcl.oid
            JOIN pg_attribute a ON a.attrelid = con.conrelid
            JOIN pg_attribute fa ON fa.attrelid = con.confrelid
            WHERE con.contype = 'f'
            AND cl.relname = $1
            AND ns.nspname = $2
            AND a.attnum = ANY(con.conkey)
            AND fa.attnum = ANY(con.confkey)
            AND array_position(con.conkey, a.attnum) = array_position(con.confkey, fa.attnum)
            ORDER BY con.conname, array_position(con.conkey, a.attnum)
        "#;

        let fk_rows = sqlx::query(fk_query)
            .bind(table)
            .bind(schema)
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
            let constraint_name: String = get_field(row, "constraint_name", table)?;
            let column: String = get_field(row, "column_name", table)?;
            let referenced_table: String = get_field(row, "referenced_table", table)?;
            let referenced_column: String = get_field(row, "referenced_column", table)?;

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
impl SchemaReflector for PostgresReflector {
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

        let _: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM information_schema.schemata")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::reflection_failed("Cannot access information_schema", e))?;

        Ok(())
    }

    async fn reflect_schema(&self, schema: &str) -> Result<SchemaSnapshot> {
        if !self.schema_exists(schema).await? {
            return Err(Error::schema_not_found(schema));
        }

        tracing::debug!("Enumerating tables in PostgreSQL schema '{}'", schema);

        let tables_query = r#"
            SELECT table_name
            FROM information_schema.tables
            WHERE table_schema = $1
            AND table_type = 'BASE TABLE'
            ORDER BY table_name
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
                .try_get("table_name")
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
            "Reflected {} tables from PostgreSQL schema '{}'",
            tables.len(),
            schema
        );

        Ok(SchemaSnapshot {
            schema: schema.to_string(),
            dialect: Dialect::Postgres,
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
            .map(|c| Dialect::Postgres.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        // row_to_json keeps the declared column order in the subselect
        let sample_query = format!(
            "SELECT row_to_json(t) AS row_data FROM (SELECT {} FROM {}.{} LIMIT $1) t",
            select_list,
            Dialect::Postgres.quote_ident(schema),
            Dialect::Postgres.quote_ident(&table.name)
        );

        let rows: Vec<JsonValue> = sqlx::query_scalar(&sample_query)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                Error::reflection_failed(
                    format!("Failed to sample table '{}.{}'", schema, table.name),
                    e,
                )
            })?;

        Ok(TableSample {
            table: table.name.clone(),
            schema: schema.to_string(),
            columns,
            rows,
        })
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

/// Extracts a typed field from a row with table context in the error.
fn get_field<'r, T>(row: &'r sqlx::postgres::PgRow, field: &str, table: &str) -> Result<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(field).map_err(|e| {
        Error::reflection_failed(
            format!("Failed to parse field '{}' for table '{}'", field, table),
            e,
        )
    })
}

/// Rebuilds the native type spelling from information_schema fields.
fn format_type(
    data_type: &str,
    udt_name: &str,
    character_maximum_length: Option<i32>,
    numeric_precision: Option<i32>,
    numeric_scale: Option<i32>,
) -> String {
    match data_type {
        "character varying" | "character" => match character_maximum_length {
            Some(len) => format!("{}({})", data_type, len),
            None => data_type.to_string(),
        },
        "numeric" => match (numeric_precision, numeric_scale) {
            (Some(p), Some(s)) => format!("numeric({},{})", p, s),
            (Some(p), None) => format!("numeric({})", p),
            _ => "numeric".to_string(),
        },
        "ARRAY" => {
            let element = udt_name.strip_prefix('_').unwrap_or(udt_name);
            format!("{}[]", element)
        }
        "USER-DEFINED" => udt_name.to_string(),
        other => other.to_string(),
    }
}
