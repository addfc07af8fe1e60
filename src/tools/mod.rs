//! MCP tool implementations.
//!
//! This module contains the database tool handlers:
//! - `query`: `query_sql`, run a statement and render its rows
//! - `schema`: `list_tables` and `describe_table`
//! - `write`: `execute_nonquery`, execute and commit with rollback on failure
//! - `info`: `database_info` and `list_odbc_drivers`
//! - `dispatch`: routing by name and failure isolation
//! - `format`: result serialization shared by the handlers

pub mod dispatch;
pub mod format;
pub mod info;
pub mod query;
pub mod schema;
pub mod write;

pub use dispatch::{Tool, ToolDispatcher};
pub use info::{DatabaseInfo, InfoToolHandler};
pub use query::{DEFAULT_QUERY, QueryOutput, QueryToolHandler};
pub use schema::{SchemaToolHandler, TableDescription, TableName};
pub use write::WriteToolHandler;
