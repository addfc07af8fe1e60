//! Schema introspection tools.
//!
//! This module implements `list_tables` and `describe_table` against the
//! `INFORMATION_SCHEMA` catalog views.

use crate::db::ConnectionManager;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnDescriptor, SqlValue};
use crate::tools::format::{describe_entry, string_array};
use std::sync::Arc;
use tracing::{debug, info};

const LIST_TABLES_SQL: &str = "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME";

const DESCRIBE_TABLE_SQL: &str =
    "SELECT COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_NAME = ? ORDER BY TABLE_SCHEMA, ORDINAL_POSITION";

const DESCRIBE_QUALIFIED_TABLE_SQL: &str =
    "SELECT COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION";

/// A table reference, optionally schema-qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub schema: Option<String>,
    pub table: String,
}

impl TableName {
    /// Parse `table`, `schema.table`, `[table]` or `[schema].[table]`.
    ///
    /// Inside brackets a dot is part of the name and `]]` stands for `]`.
    pub fn parse(input: &str) -> DbResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DbError::invalid_input("Table name cannot be empty"));
        }

        let mut parts = Vec::new();
        let mut current = String::new();
        let mut chars = trimmed.chars().peekable();
        let mut in_brackets = false;

        while let Some(c) = chars.next() {
            match c {
                '[' if !in_brackets && current.is_empty() => in_brackets = true,
                ']' if in_brackets => {
                    if chars.peek() == Some(&']') {
                        chars.next();
                        current.push(']');
                    } else {
                        in_brackets = false;
                    }
                }
                '.' if !in_brackets => parts.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        if in_brackets {
            return Err(DbError::invalid_input(format!(
                "Unclosed bracket in table name '{}'",
                input
            )));
        }
        parts.push(current);

        let mut parts: Vec<String> = parts.into_iter().map(|p| p.trim().to_string()).collect();
        if parts.iter().any(String::is_empty) {
            return Err(DbError::invalid_input(format!(
                "Invalid table name '{}'",
                input
            )));
        }

        match parts.len() {
            1 => Ok(Self {
                schema: None,
                table: parts.remove(0),
            }),
            2 => {
                let table = parts.remove(1);
                let schema = parts.remove(0);
                Ok(Self {
                    schema: Some(schema),
                    table,
                })
            }
            _ => Err(DbError::invalid_input(format!(
                "Table name '{}' must be 'table' or 'schema.table'",
                input
            ))),
        }
    }
}

/// Column listing for `describe_table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    /// The name as the caller supplied it
    pub table_name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescription {
    pub fn is_found(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn to_text(&self) -> String {
        if self.columns.is_empty() {
            format!("Table '{}' not found or has no columns.", self.table_name)
        } else {
            format!(
                "Structure of table '{}':\n{}",
                self.table_name,
                self.columns
                    .iter()
                    .map(describe_entry)
                    .collect::<Vec<_>>()
                    .join("\n")
            )
        }
    }
}

/// Text for a successful `list_tables`.
pub fn list_tables_text(tables: &[String]) -> String {
    format!("Available tables: {}", string_array(tables))
}

/// Handler for schema tools.
pub struct SchemaToolHandler {
    connection_manager: Arc<ConnectionManager>,
}

impl SchemaToolHandler {
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self { connection_manager }
    }

    /// Names of all base tables, ordered by name.
    pub async fn list_tables(&self) -> DbResult<Vec<String>> {
        let tables = self
            .connection_manager
            .with_connection("list_tables", |conn| {
                let set = conn.execute(LIST_TABLES_SQL, &[])?.into_result_set()?;
                Ok(set
                    .rows
                    .iter()
                    .filter_map(|row| row.first())
                    .filter(|v| !v.is_null())
                    .map(SqlValue::to_display_string)
                    .collect::<Vec<_>>())
            })
            .await?;

        info!(table_count = tables.len(), "Listed tables");
        Ok(tables)
    }

    pub async fn describe_table(&self, table_name: &str) -> DbResult<TableDescription> {
        // Unavailability wins over a malformed name.
        self.connection_manager.ensure_connected().await?;
        let name = TableName::parse(table_name)?;
        debug!(schema = ?name.schema, table = %name.table, "Describing table");

        let (sql, params) = match name.schema {
            Some(schema) => (DESCRIBE_QUALIFIED_TABLE_SQL, vec![schema, name.table]),
            None => (DESCRIBE_TABLE_SQL, vec![name.table]),
        };

        let columns = self
            .connection_manager
            .with_connection("describe_table", move |conn| {
                let set = conn.execute(sql, &params)?.into_result_set()?;
                Ok(set
                    .rows
                    .iter()
                    .map(|row| {
                        let cell = |i: usize| row.get(i).cloned().unwrap_or(SqlValue::Null);
                        ColumnDescriptor::new(cell(0).to_display_string(), cell(1).to_display_string())
                            .with_max_length(cell(2).as_i64())
                    })
                    .collect::<Vec<_>>())
            })
            .await?;

        let description = TableDescription {
            table_name: table_name.to_string(),
            columns,
        };
        info!(
            table = %table_name,
            found = description.is_found(),
            column_count = description.columns.len(),
            "Described table"
        );
        Ok(description)
    }
}
