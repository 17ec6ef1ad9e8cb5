//! DDL rendering.
//!
//! Pure functions from snapshot to SQL text: given the same snapshot the
//! output is byte-identical, which is what makes re-runs diffable.

use crate::dialect::Dialect;
use crate::models::{SchemaSnapshot, TableDescriptor};

/// Renders one `CREATE TABLE` statement, terminated by `;` and a newline.
pub fn render_create_table(dialect: Dialect, table: &TableDescriptor) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(table.columns.len() + 2);

    for column in &table.columns {
        let mut line = format!("    {}", dialect.quote_ident(&column.name));
        if !column.sql_type.is_empty() {
            line.push(' ');
            line.push_str(&column.sql_type);
        }
        if !column.is_nullable {
            line.push_str(" NOT NULL");
        }
        lines.push(line);
    }

    if !table.primary_key.is_empty() {
        let cols = table
            .primary_key
            .iter()
            .map(|c| dialect.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("    PRIMARY KEY ({})", cols));
    }

    for fk in &table.foreign_keys {
        let mut clause = format!(
            "    FOREIGN KEY ({}) REFERENCES {}",
            dialect.quote_ident(&fk.column),
            dialect.quote_ident(&fk.referenced_table)
        );
        if let Some(referenced_column) = &fk.referenced_column {
            clause.push_str(&format!(" ({})", dialect.quote_ident(referenced_column)));
        }
        lines.push(clause);
    }

    format!(
        "CREATE TABLE {} (\n{}\n);\n",
        dialect.quote_ident(&table.name),
        lines.join(",\n")
    )
}

/// Renders the full DDL file for a snapshot: one statement per table in
/// snapshot order, separated by a blank line.
pub fn render_schema_ddl(snapshot: &SchemaSnapshot) -> String {
    snapshot
        .tables
        .iter()
        .map(|table| render_create_table(snapshot.dialect, table))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnDescriptor, ForeignKeyRef};

    fn column(name: &str, sql_type: &str, nullable: bool) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            is_nullable: nullable,
            default_value: None,
            ordinal_position: 0,
        }
    }

    fn users_table() -> TableDescriptor {
        TableDescriptor {
            name: "users".to_string(),
            columns: vec![column("id", "INTEGER", false), column("name", "TEXT", true)],
            primary_key: vec!["id".to_string()],
            foreign_keys: Vec::new(),
        }
    }

    #[test]
    fn test_render_create_table_basic() {
        let ddl = render_create_table(Dialect::Sqlite, &users_table());
        assert_eq!(
            ddl,
            "CREATE TABLE \"users\" (\n    \"id\" INTEGER NOT NULL,\n    \"name\" TEXT,\n    PRIMARY KEY (\"id\")\n);\n"
        );
    }

    #[test]
    fn test_render_create_table_no_primary_key() {
        let table = TableDescriptor {
            name: "log".to_string(),
            columns: vec![column("line", "TEXT", true)],
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        };

        let ddl = render_create_table(Dialect::Postgres, &table);
        assert!(!ddl.contains("PRIMARY KEY"));
        assert!(ddl.ends_with(";\n"));
    }

    #[test]
    fn test_render_create_table_foreign_key() {
        let table = TableDescriptor {
            name: "orders".to_string(),
            columns: vec![
                column("id", "INTEGER", false),
                column("user_id", "INTEGER", true),
            ],
            primary_key: vec!["id".to_string()],
            foreign_keys: vec![ForeignKeyRef {
                constraint_name: None,
                column: "user_id".to_string(),
                referenced_table: "users".to_string(),
                referenced_column: Some("id".to_string()),
            }],
        };

        let ddl = render_create_table(Dialect::Sqlite, &table);
        assert!(ddl.contains("FOREIGN KEY (\"user_id\") REFERENCES \"users\" (\"id\")"));
    }

    #[test]
    fn test_render_create_table_mysql_quoting() {
        let ddl = render_create_table(Dialect::MySql, &users_table());
        assert!(ddl.starts_with("CREATE TABLE `users` ("));
        assert!(ddl.contains("`id` INTEGER NOT NULL"));
    }

    #[test]
    fn test_render_schema_ddl_is_deterministic() {
        let snapshot = SchemaSnapshot {
            schema: "main".to_string(),
            dialect: Dialect::Sqlite,
            tables: vec![users_table(), users_table()],
            reflected_at: chrono::Utc::now(),
        };

        let first = render_schema_ddl(&snapshot);
        let second = render_schema_ddl(&snapshot);
        assert_eq!(first, second);

        // One statement per table, blank line between them
        assert_eq!(first.matches("CREATE TABLE").count(), 2);
        assert!(first.contains(";\n\nCREATE TABLE"));
    }
}
