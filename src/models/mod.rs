//! Data models for the ODBC MCP Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod tool;

// Re-export commonly used types
pub use connection::LifecycleState;
pub use query::{ColumnDescriptor, ResultSet, SqlValue, StatementOutcome};
pub use tool::{ToolRequest, ToolResult};
