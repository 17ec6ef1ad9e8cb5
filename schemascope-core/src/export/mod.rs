//! Exporter: writes reflected schemas to the output directory.
//!
//! Two outputs per schema: `<schema>_table_definitions.sql` with one
//! `CREATE TABLE` statement per table, and one `<table>.csv` row sample per
//! table. A sampling or write failure for one table does not abort the
//! rest; failures are logged and reported. An empty schema produces no
//! files at all.

pub mod csv;
pub mod ddl;

use crate::models::SchemaSnapshot;
use crate::reflect::SchemaReflector;
use crate::{Result, error::Error};
use std::path::{Path, PathBuf};

pub use csv::render_sample_csv;
pub use ddl::{render_create_table, render_schema_ddl};

/// What one export run produced.
#[derive(Debug, Default)]
pub struct ExportReport {
    /// Path of the DDL file, absent for an empty schema
    pub ddl_path: Option<PathBuf>,
    /// Paths of the sample files written
    pub sample_paths: Vec<PathBuf>,
    /// Tables whose sample failed, with the failure message
    pub failed_tables: Vec<(String, String)>,
}

/// Writes DDL and sample files for reflected schemas.
pub struct Exporter {
    output_dir: PathBuf,
    sample_rows: u32,
}

impl Exporter {
    /// Creates an exporter targeting `output_dir`, sampling up to
    /// `sample_rows` rows per table (0 disables sampling).
    pub fn new(output_dir: impl Into<PathBuf>, sample_rows: u32) -> Self {
        Self {
            output_dir: output_dir.into(),
            sample_rows,
        }
    }

    /// Exports one snapshot: the DDL file, then one sample file per table.
    ///
    /// # Errors
    /// Returns `Error::Io` when the output directory cannot be created or
    /// the DDL file cannot be written. Per-table sample failures are
    /// recorded in the report instead of aborting.
    pub async fn export(
        &self,
        snapshot: &SchemaSnapshot,
        reflector: &dyn SchemaReflector,
    ) -> Result<ExportReport> {
        let mut report = ExportReport::default();

        if snapshot.is_empty() {
            tracing::info!(
                "Schema '{}' holds no tables; no files written",
                snapshot.schema
            );
            return Ok(report);
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| {
                Error::io(
                    format!(
                        "Failed to create output directory {}",
                        self.output_dir.display()
                    ),
                    e,
                )
            })?;

        report.ddl_path = Some(self.write_ddl(snapshot).await?);

        if self.sample_rows == 0 {
            tracing::debug!("Sampling disabled; skipping sample files");
            return Ok(report);
        }

        for table in &snapshot.tables {
            match self.write_sample(snapshot, reflector, table).await {
                Ok(path) => report.sample_paths.push(path),
                Err(e) => {
                    tracing::warn!(
                        "Skipping sample for table '{}.{}': {}",
                        snapshot.schema,
                        table.name,
                        e
                    );
                    report.failed_tables.push((table.name.clone(), e.to_string()));
                }
            }
        }

        tracing::info!(
            "Exported schema '{}': {} tables, {} sample files, {} failures",
            snapshot.schema,
            snapshot.tables.len(),
            report.sample_paths.len(),
            report.failed_tables.len()
        );

        Ok(report)
    }

    async fn write_ddl(&self, snapshot: &SchemaSnapshot) -> Result<PathBuf> {
        let path = self
            .output_dir
            .join(format!("{}_table_definitions.sql", snapshot.schema));
        let ddl = ddl::render_schema_ddl(snapshot);

        write_file(&path, ddl.as_bytes()).await?;
        tracing::info!(
            "Wrote DDL for {} tables to {}",
            snapshot.tables.len(),
            path.display()
        );
        Ok(path)
    }

    async fn write_sample(
        &self,
        snapshot: &SchemaSnapshot,
        reflector: &dyn SchemaReflector,
        table: &crate::models::TableDescriptor,
    ) -> Result<PathBuf> {
        let sample = reflector
            .sample_table(&snapshot.schema, table, self.sample_rows)
            .await?;

        let path = self.output_dir.join(format!("{}.csv", table.name));
        let rendered = csv::render_sample_csv(&sample);
        write_file(&path, rendered.as_bytes()).await?;

        tracing::debug!(
            "Wrote {} sample rows for '{}' to {}",
            sample.rows.len(),
            table.name,
            path.display()
        );
        Ok(path)
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| Error::io(format!("Failed to write to {}", path.display()), e))
}
