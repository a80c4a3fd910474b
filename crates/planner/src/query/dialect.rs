//! Defines the `Dialect` trait for database-specific SQL syntax.

use crate::query::ast::create_table::ColumnType;

pub trait Dialect: Send + Sync {
    /// Wraps an identifier (like a table or column name) in the correct
    /// quotation marks for the dialect.
    fn quote_identifier(&self, ident: &str) -> String;

    /// Returns the placeholder for a parameterized query.
    ///
    /// - PostgreSQL uses `$1`, `$2`, etc.
    /// - SQLite uses `?1`, `?2`, etc.
    fn get_placeholder(&self, index: usize) -> String;

    /// Renders a generic column type into a database-specific SQL type string.
    fn render_data_type(&self, data_type: ColumnType) -> String;

    /// Returns the name of the dialect (e.g., "PostgreSQL", "SQLite").
    fn name(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct Postgres;

impl Dialect for Postgres {
    fn quote_identifier(&self, ident: &str) -> String {
        format!(r#""{}""#, ident.replace('"', "\"\""))
    }

    fn get_placeholder(&self, index: usize) -> String {
        format!("${}", index + 1)
    }

    fn render_data_type(&self, data_type: ColumnType) -> String {
        match data_type {
            ColumnType::Text => "TEXT".into(),
            ColumnType::BigInt => "BIGINT".into(),
            ColumnType::Timestamp => "TIMESTAMPTZ".into(),
        }
    }

    fn name(&self) -> String {
        "PostgreSQL".into()
    }
}

#[derive(Debug, Clone)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn quote_identifier(&self, ident: &str) -> String {
        format!(r#""{}""#, ident.replace('"', "\"\""))
    }

    fn get_placeholder(&self, index: usize) -> String {
        format!("?{}", index + 1)
    }

    fn render_data_type(&self, data_type: ColumnType) -> String {
        // SQLite stores timestamps as ISO-8601 text.
        match data_type {
            ColumnType::Text | ColumnType::Timestamp => "TEXT".into(),
            ColumnType::BigInt => "INTEGER".into(),
        }
    }

    fn name(&self) -> String {
        "SQLite".into()
    }
}
