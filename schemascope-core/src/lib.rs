//! Core library for schemascope: one-shot, read-only database schema
//! reflection and export.
//!
//! The workflow is three leaf-to-root steps with no feedback:
//! - **Connector** ([`reflect::connect`]): turns a [`config::ConnectionConfig`]
//!   into a live [`reflect::SchemaReflector`].
//! - **Reflector**: queries catalog views to produce a
//!   [`models::SchemaSnapshot`] for one named schema.
//! - **Exporter** ([`export::Exporter`]): writes the snapshot as a SQL-DDL
//!   file plus bounded per-table CSV row samples.
//!
//! All database operations are read-only; credentials never appear in logs,
//! errors, or `Debug` output.

pub mod config;
pub mod dialect;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod reflect;

// Re-export commonly used types
pub use config::ConnectionConfig;
pub use dialect::Dialect;
pub use error::{Error, Result, redact_database_url};
pub use export::{ExportReport, Exporter};
pub use logging::init_logging;
pub use models::{
    ColumnDescriptor, ForeignKeyRef, SchemaSnapshot, TableDescriptor, TableSample,
};
pub use reflect::{SchemaReflector, connect, connect_url};
