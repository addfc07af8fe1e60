//! MCP service implementation using rmcp.
//!
//! This module defines the OdbcService struct with the six SQL Server tools
//! exposed via the MCP protocol using the rmcp framework's macros. Each tool
//! delegates to the [`ToolDispatcher`] and returns its text as a single text
//! content block; failures are returned as error results, never as protocol
//! errors.

use crate::db::ConnectionManager;
use crate::models::ToolResult;
use crate::tools::ToolDispatcher;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

/// Input for the query_sql tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct QuerySqlInput {
    /// SQL statement to execute. When omitted or empty, runs `SELECT * FROM [dbo].[Table_1]`.
    #[serde(default)]
    pub query: Option<String>,
}

/// Input for the describe_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Table name, optionally schema-qualified (`dbo.Orders` or `[dbo].[Orders]`)
    pub table_name: String,
}

/// Input for the execute_nonquery tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteNonqueryInput {
    /// SQL statement to execute and commit (INSERT, UPDATE, DELETE, DDL)
    pub sql: String,
}

fn into_call_result(result: ToolResult) -> CallToolResult {
    match result {
        ToolResult::Success(text) => CallToolResult::success(vec![Content::text(text)]),
        ToolResult::Failure(text) => CallToolResult::error(vec![Content::text(text)]),
    }
}

#[derive(Clone)]
pub struct OdbcService {
    /// Shared dispatcher for all tool invocations
    dispatcher: Arc<ToolDispatcher>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl OdbcService {
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self::with_dispatcher(Arc::new(ToolDispatcher::new(connection_manager)))
    }

    pub fn with_dispatcher(dispatcher: Arc<ToolDispatcher>) -> Self {
        Self {
            dispatcher,
            tool_router: Self::tool_router(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<ToolDispatcher> {
        &self.dispatcher
    }
}

#[tool_router]
impl OdbcService {
    #[tool(
        description = "Query the SQL database with a custom query.\nReturns rows as a JSON array of objects, or the affected row count for statements without results.\nRuns `SELECT * FROM [dbo].[Table_1]` when no query is given."
    )]
    async fn query_sql(
        &self,
        Parameters(input): Parameters<QuerySqlInput>,
    ) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(
            self.dispatcher.query_sql(input.query.as_deref()).await,
        ))
    }

    #[tool(description = "List all tables in the database that can be queried.")]
    async fn list_tables(&self) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(self.dispatcher.list_tables().await))
    }

    #[tool(
        description = "Get the structure of a specific table.\nReturns one line per column with its data type and maximum length."
    )]
    async fn describe_table(
        &self,
        Parameters(input): Parameters<DescribeTableInput>,
    ) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(
            self.dispatcher.describe_table(&input.table_name).await,
        ))
    }

    #[tool(
        description = "Execute a non-query SQL statement (INSERT, UPDATE, DELETE, etc.) and commit it.\nThe transaction is rolled back if the statement fails."
    )]
    async fn execute_nonquery(
        &self,
        Parameters(input): Parameters<ExecuteNonqueryInput>,
    ) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(
            self.dispatcher.execute_nonquery(&input.sql).await,
        ))
    }

    #[tool(description = "List available ODBC drivers on the system.")]
    async fn list_odbc_drivers(&self) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(self.dispatcher.list_odbc_drivers().await))
    }

    #[tool(description = "Get general information about the connected database.")]
    async fn database_info(&self) -> Result<CallToolResult, McpError> {
        Ok(into_call_result(self.dispatcher.database_info().await))
    }
}

#[tool_handler]
impl ServerHandler for OdbcService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "odbc-mcp-server".to_owned(),
                title: Some("ODBC MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "SQL Server tools over a single shared ODBC connection.\n\
                \n\
                ## Workflow\n\
                1. Call `list_tables` to see the available tables\n\
                2. Call `describe_table` to inspect a table's columns\n\
                3. Use `query_sql` to read data and `execute_nonquery` to change it\n\
                \n\
                ## Notes\n\
                - `execute_nonquery` commits on success and rolls back on failure\n\
                - `query_sql` does not commit; use `execute_nonquery` for writes\n\
                - If tools report that the database connection is not available, the startup\n\
                  connection failed; check the server logs and restart once the database is reachable\n\
                - `list_odbc_drivers` works without a database connection"
                    .to_string(),
            ),
        }
    }
}
