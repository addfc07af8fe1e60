//! ODBC MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for AI assistants
//! to work with a SQL Server database through a single ODBC connection that is
//! opened at startup and shared by every tool invocation.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use db::ConnectionManager;
pub use error::DbError;
pub use mcp::OdbcService;
pub use tools::ToolDispatcher;
