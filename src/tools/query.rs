//! Query execution tool.
//!
//! This module implements the `query_sql` MCP tool. The statement text is run
//! verbatim: it is not validated, parameterized or restricted to reads.
//! Nothing is committed here; the connection runs with autocommit off, so
//! writes issued through this tool stay pending until a later
//! `execute_nonquery` commits or the connection is closed.

use crate::db::ConnectionManager;
use crate::error::DbResult;
use crate::models::StatementOutcome;
use crate::tools::format::rows_to_json;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info};

/// Statement run when `query_sql` is called without a query.
pub const DEFAULT_QUERY: &str = "SELECT * FROM [dbo].[Table_1]";

/// Output from the query tool.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// Rows as a JSON array of objects keyed by column name
    Rows(JsonValue),
    /// The statement produced no result set
    Affected(i64),
}

impl QueryOutput {
    pub fn row_count(&self) -> usize {
        match self {
            Self::Rows(JsonValue::Array(rows)) => rows.len(),
            Self::Rows(_) | Self::Affected(_) => 0,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Self::Rows(rows) => format!("Query results: {}", rows),
            Self::Affected(n) => format!("Query affected {} rows", n),
        }
    }
}

/// Resolve the statement to run; a missing or blank query means the default.
pub fn effective_query(query: Option<&str>) -> &str {
    match query {
        Some(q) if !q.trim().is_empty() => q,
        _ => DEFAULT_QUERY,
    }
}

/// Handler for the query_sql tool.
pub struct QueryToolHandler {
    connection_manager: Arc<ConnectionManager>,
}

impl QueryToolHandler {
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self { connection_manager }
    }

    pub async fn query_sql(&self, query: Option<&str>) -> DbResult<QueryOutput> {
        let sql = effective_query(query).to_string();
        debug!(sql = %sql, "Executing query");

        let output = self
            .connection_manager
            .with_connection("query_sql", move |conn| {
                Ok(match conn.execute(&sql, &[])? {
                    StatementOutcome::ResultSet(set) => QueryOutput::Rows(rows_to_json(&set)),
                    StatementOutcome::RowsAffected(n) => QueryOutput::Affected(n),
                })
            })
            .await?;

        info!(row_count = output.row_count(), "Query completed");
        Ok(output)
    }
}
