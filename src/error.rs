//! Error types for the ODBC MCP Server.
//!
//! This module defines all error types using `thiserror`. Every failure that can
//! happen inside a tool body is represented here, so the dispatcher can turn it
//! into a textual tool result instead of letting it escape.

use std::any::Any;
use thiserror::Error;

/// Text returned by every connection-dependent tool while no connection is held.
pub const CONNECTION_UNAVAILABLE_MESSAGE: &str =
    "Database connection is not available. Check server logs for details.";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("{}", CONNECTION_UNAVAILABLE_MESSAGE)]
    ConnectionUnavailable,

    #[error("Connection failed: {message}")]
    ConnectionSetup { message: String, suggestion: String },

    #[error("Query execution failed: {message}")]
    QueryExecution { message: String },

    #[error("Statement failed: {message} (rolled back: {rolled_back})")]
    NonQuery { message: String, rolled_back: bool },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Unexpected fault: {message}")]
    Unexpected { message: String },
}

impl DbError {
    /// Create a connection setup error with a helpful suggestion.
    pub fn connection_setup(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConnectionSetup {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a query execution error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryExecution {
            message: message.into(),
        }
    }

    /// Create a non-query (execute/commit) error.
    pub fn non_query(message: impl Into<String>, rolled_back: bool) -> Self {
        Self::NonQuery {
            message: message.into(),
            rolled_back,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an unexpected fault error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Classification used in log records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionUnavailable => "ConnectionUnavailable",
            Self::ConnectionSetup { .. } => "ConnectionSetupFailure",
            Self::QueryExecution { .. } => "QueryExecutionFailure",
            Self::NonQuery { .. } => "NonQueryFailure",
            Self::InvalidInput { .. } => "InvalidInput",
            Self::Timeout { .. } => "Timeout",
            Self::Transport { .. } => "TransportFailure",
            Self::Unexpected { .. } => "UnexpectedFault",
        }
    }

    /// The bare message without the variant prefix, for tool result texts.
    pub fn detail(&self) -> String {
        match self {
            Self::ConnectionUnavailable => CONNECTION_UNAVAILABLE_MESSAGE.to_string(),
            Self::ConnectionSetup { message, .. }
            | Self::QueryExecution { message }
            | Self::NonQuery { message, .. }
            | Self::Transport { message }
            | Self::Unexpected { message } => message.clone(),
            Self::InvalidInput { .. } | Self::Timeout { .. } => self.to_string(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::ConnectionSetup { suggestion, .. } => Some(suggestion),
            Self::ConnectionUnavailable => {
                Some("The startup connection attempt failed; restart the server once the database is reachable")
            }
            _ => None,
        }
    }
}

/// Driver errors surface as statement failures unless a call site maps them
/// to something more specific (connect, commit).
impl From<odbc_api::Error> for DbError {
    fn from(err: odbc_api::Error) -> Self {
        DbError::query(err.to_string())
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic (no message)".to_string()
    }
}

fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert DbError to MCP ErrorData for failures outside tool bodies.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::InvalidInput { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), suggestion_data(err.suggestion()))
            }
            DbError::ConnectionUnavailable => rmcp::ErrorData::resource_not_found(
                err.to_string(),
                suggestion_data(err.suggestion()),
            ),
            _ => rmcp::ErrorData::internal_error(err.to_string(), suggestion_data(err.suggestion())),
        }
    }
}
