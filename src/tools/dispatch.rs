//! Tool dispatch and failure isolation.
//!
//! Every tool invocation produces exactly one [`ToolResult`]. Errors and
//! panics raised while a tool body runs are converted into a `Failure` with
//! the tool's error prefix and logged with their classification; nothing
//! escapes to the transport.

use crate::db::ConnectionManager;
use crate::error::{CONNECTION_UNAVAILABLE_MESSAGE, DbError, DbResult, panic_message};
use crate::models::{ToolRequest, ToolResult};
use crate::tools::info::{InfoToolHandler, drivers_text};
use crate::tools::query::QueryToolHandler;
use crate::tools::schema::{SchemaToolHandler, list_tables_text};
use crate::tools::write::{WriteToolHandler, execute_text};
use futures_util::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// The tool catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    QuerySql,
    ListTables,
    DescribeTable,
    ExecuteNonquery,
    ListOdbcDrivers,
    DatabaseInfo,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::QuerySql,
        Tool::ListTables,
        Tool::DescribeTable,
        Tool::ExecuteNonquery,
        Tool::ListOdbcDrivers,
        Tool::DatabaseInfo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::QuerySql => "query_sql",
            Self::ListTables => "list_tables",
            Self::DescribeTable => "describe_table",
            Self::ExecuteNonquery => "execute_nonquery",
            Self::ListOdbcDrivers => "list_odbc_drivers",
            Self::DatabaseInfo => "database_info",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Failure text for `err` raised by this tool.
    pub fn failure_text(&self, err: &DbError) -> String {
        if matches!(err, DbError::ConnectionUnavailable) {
            return CONNECTION_UNAVAILABLE_MESSAGE.to_string();
        }

        let detail = err.detail();
        match (self, err) {
            (Self::QuerySql, DbError::QueryExecution { .. }) => format!("Query error: {}", detail),
            (Self::QuerySql, _) => format!("Error: {}", detail),
            (Self::ListTables, _) => format!("Error listing tables: {}", detail),
            (Self::DescribeTable, _) => format!("Error describing table: {}", detail),
            (Self::ExecuteNonquery, DbError::NonQuery { .. }) => {
                format!("Operation failed: {}", detail)
            }
            (Self::ExecuteNonquery, _) => format!("Error executing SQL: {}", detail),
            (Self::ListOdbcDrivers, _) => format!("Error listing drivers: {}", detail),
            (Self::DatabaseInfo, _) => format!("Error getting database info: {}", detail),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Routes tool invocations to their handlers.
pub struct ToolDispatcher {
    connection_manager: Arc<ConnectionManager>,
    query: QueryToolHandler,
    schema: SchemaToolHandler,
    write: WriteToolHandler,
    info: InfoToolHandler,
}

impl ToolDispatcher {
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self {
            query: QueryToolHandler::new(Arc::clone(&connection_manager)),
            schema: SchemaToolHandler::new(Arc::clone(&connection_manager)),
            write: WriteToolHandler::new(Arc::clone(&connection_manager)),
            info: InfoToolHandler::new(Arc::clone(&connection_manager)),
            connection_manager,
        }
    }

    pub fn connection_manager(&self) -> &Arc<ConnectionManager> {
        &self.connection_manager
    }

    /// Run a tool by name with JSON arguments.
    pub async fn dispatch(&self, request: ToolRequest) -> ToolResult {
        let Some(tool) = Tool::from_name(&request.name) else {
            warn!(tool = %request.name, "Unknown tool requested");
            return ToolResult::Failure(format!("Unknown tool: {}", request.name));
        };

        match tool {
            Tool::QuerySql => {
                self.query_sql(request.string_argument("query").as_deref())
                    .await
            }
            Tool::ListTables => self.list_tables().await,
            Tool::DescribeTable => match request.string_argument("table_name") {
                Some(table_name) => self.describe_table(&table_name).await,
                None => self.missing_argument(tool, "table_name").await,
            },
            Tool::ExecuteNonquery => match request.string_argument("sql") {
                Some(sql) => self.execute_nonquery(&sql).await,
                None => self.missing_argument(tool, "sql").await,
            },
            Tool::ListOdbcDrivers => self.list_odbc_drivers().await,
            Tool::DatabaseInfo => self.database_info().await,
        }
    }

    pub async fn query_sql(&self, query: Option<&str>) -> ToolResult {
        self.guarded(Tool::QuerySql, async {
            Ok(self.query.query_sql(query).await?.to_text())
        })
        .await
    }

    pub async fn list_tables(&self) -> ToolResult {
        self.guarded(Tool::ListTables, async {
            Ok(list_tables_text(&self.schema.list_tables().await?))
        })
        .await
    }

    /// A missing table is reported as a success with a not-found text.
    pub async fn describe_table(&self, table_name: &str) -> ToolResult {
        self.guarded(Tool::DescribeTable, async {
            Ok(self.schema.describe_table(table_name).await?.to_text())
        })
        .await
    }

    pub async fn execute_nonquery(&self, sql: &str) -> ToolResult {
        self.guarded(Tool::ExecuteNonquery, async {
            Ok(execute_text(self.write.execute_nonquery(sql).await?))
        })
        .await
    }

    pub async fn list_odbc_drivers(&self) -> ToolResult {
        self.guarded(Tool::ListOdbcDrivers, async {
            Ok(drivers_text(&self.info.list_odbc_drivers().await?))
        })
        .await
    }

    pub async fn database_info(&self) -> ToolResult {
        self.guarded(Tool::DatabaseInfo, async {
            Ok(self.info.database_info().await?.to_text())
        })
        .await
    }

    /// Arguments are only checked for tools that could run at all.
    async fn missing_argument(&self, tool: Tool, argument: &str) -> ToolResult {
        if self.connection_manager.ensure_connected().await.is_err() {
            warn!(tool = %tool, "Tool called without a database connection");
            return ToolResult::Failure(CONNECTION_UNAVAILABLE_MESSAGE.to_string());
        }
        warn!(tool = %tool, argument, "Missing required argument");
        ToolResult::Failure(format!("Missing required argument: {}", argument))
    }

    async fn guarded<F>(&self, tool: Tool, body: F) -> ToolResult
    where
        F: Future<Output = DbResult<String>>,
    {
        let start = Instant::now();
        debug!(tool = %tool, "Tool invoked");

        let outcome = match AssertUnwindSafe(body).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                Err(DbError::unexpected(format!("Panic in {}: {}", tool, message)))
            }
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(text) => {
                info!(tool = %tool, elapsed_ms, "Tool succeeded");
                ToolResult::Success(text)
            }
            Err(DbError::ConnectionUnavailable) => {
                warn!(tool = %tool, "Tool called without a database connection");
                ToolResult::Failure(CONNECTION_UNAVAILABLE_MESSAGE.to_string())
            }
            Err(e) => {
                error!(tool = %tool, kind = e.kind(), error = %e, elapsed_ms, "Tool failed");
                ToolResult::Failure(tool.failure_text(&e))
            }
        }
    }
}
