//! Schema reflectors and the connector factory.
//!
//! Each dialect gets one reflector module implementing [`SchemaReflector`];
//! `connect` is the single entry point that turns a validated
//! `ConnectionConfig` into a live, read-only handle. All reflector
//! operations query catalog views only — the sole touch of user data is
//! the bounded row sample.

use crate::config::ConnectionConfig;
use crate::dialect::Dialect;
use crate::models::{SchemaSnapshot, TableDescriptor, TableSample};
use crate::{Result, error::Error};
use async_trait::async_trait;

/// Object-safe interface over one live database connection.
///
/// Implementations hold an sqlx pool opened once per run and reused for
/// every reflection and sampling call.
#[async_trait]
pub trait SchemaReflector: Send + Sync {
    /// Probes connectivity and catalog access without reflecting anything.
    ///
    /// # Errors
    /// Returns error if the connection is unusable or the catalog views
    /// cannot be read
    async fn test_connection(&self) -> Result<()>;

    /// Reflects one named schema into a snapshot.
    ///
    /// A schema that does not exist is `Error::SchemaNotFound`; a schema
    /// that exists but holds no tables is an empty snapshot. Tables with no
    /// primary key come back with an empty key list.
    async fn reflect_schema(&self, schema: &str) -> Result<SchemaSnapshot>;

    /// Samples at most `limit` rows from one table, in database-default
    /// order (no `ORDER BY`).
    async fn sample_table(
        &self,
        schema: &str,
        table: &TableDescriptor,
        limit: u32,
    ) -> Result<TableSample>;

    /// The dialect this reflector speaks.
    fn dialect(&self) -> Dialect;

    /// The connection configuration (credentials already excluded from its
    /// Display/Debug output).
    fn config(&self) -> &ConnectionConfig;
}

/// Connector: builds a live reflector from configuration.
///
/// # Errors
/// Returns `Error::Connection` when the database is unreachable or rejects
/// the credentials, `Error::Configuration` for an invalid config, and
/// `Error::UnsupportedDialect` when the dialect is not compiled in or not
/// yet implemented.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn SchemaReflector>> {
    config.validate()?;

    match config.dialect {
        #[cfg(feature = "postgresql")]
        Dialect::Postgres => {
            let reflector = postgres::PostgresReflector::new(config.clone()).await?;
            Ok(Box::new(reflector))
        }
        #[cfg(not(feature = "postgresql"))]
        Dialect::Postgres => Err(Error::unsupported_dialect(
            "PostgreSQL reflector (compile with --features postgresql)",
            Dialect::Postgres.to_string(),
        )),
        #[cfg(feature = "mysql")]
        Dialect::MySql => {
            let reflector = mysql::MySqlReflector::new(config.clone()).await?;
            Ok(Box::new(reflector))
        }
        #[cfg(not(feature = "mysql"))]
        Dialect::MySql => Err(Error::unsupported_dialect(
            "MySQL reflector (compile with --features mysql)",
            Dialect::MySql.to_string(),
        )),
        #[cfg(feature = "sqlite")]
        Dialect::Sqlite => {
            let reflector = sqlite::SqliteReflector::new(config.clone()).await?;
            Ok(Box::new(reflector))
        }
        #[cfg(not(feature = "sqlite"))]
        Dialect::Sqlite => Err(Error::unsupported_dialect(
            "SQLite reflector (compile with --features sqlite)",
            Dialect::Sqlite.to_string(),
        )),
        // Recognized so URLs parse and configs build, but no reflector yet
        Dialect::SqlServer => Err(Error::unsupported_dialect(
            "SQL Server reflector",
            Dialect::SqlServer.to_string(),
        )),
    }
}

/// Connector convenience: builds a reflector straight from a database URL.
pub async fn connect_url(connection_string: &str) -> Result<Box<dyn SchemaReflector>> {
    let config = ConnectionConfig::from_url(connection_string)?;
    connect(&config).await
}

#[cfg(feature = "postgresql")]
pub mod postgres;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let config = ConnectionConfig {
            host: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            connect(&config).await,
            Err(Error::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_sqlserver_is_unsupported() {
        let config = ConnectionConfig::new(Dialect::SqlServer, "localhost".to_string())
            .with_database("master".to_string());
        assert!(matches!(
            connect(&config).await,
            Err(Error::UnsupportedDialect { .. })
        ));
    }
}
