//! Statement result data models.
//!
//! This module defines the driver-neutral shapes a statement produces: column
//! descriptors, typed cell values, result sets and affected-row counts.

use serde::Serialize;
use serde_json::Value as JsonValue;

/// Column metadata as reported by the driver or the schema catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Driver-reported type name, e.g. "int" or "varchar"
    pub type_name: String,
    /// Maximum character length; `-1` is the catalog's marker for `(max)` types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            max_length: None,
        }
    }

    pub fn with_max_length(mut self, max_length: Option<i64>) -> Self {
        self.max_length = max_length;
        self
    }
}

/// A single cell value, already decoded according to its column's type category.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer view of the value; text holding an integer is accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Float(_) | Self::Null => None,
        }
    }

    /// Plain-text rendering; NULL renders as an empty string.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(v) => JsonValue::from(*v),
            // NaN/inf have no JSON number form
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(v.to_string())),
            Self::Text(s) => JsonValue::String(s.clone()),
        }
    }
}

/// Rows of a statement that produced a result set, aligned with `columns`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnDescriptor>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What executing one statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    ResultSet(ResultSet),
    /// Affected-row count; `-1` when the driver cannot tell (ODBC convention).
    RowsAffected(i64),
}

impl StatementOutcome {
    /// Rows affected; a statement that produced rows reports `-1` (unknown).
    pub fn rows_affected(&self) -> i64 {
        match self {
            Self::ResultSet(_) => -1,
            Self::RowsAffected(n) => *n,
        }
    }

    /// Unwrap a result set, or fail when the statement returned none.
    pub fn into_result_set(self) -> crate::error::DbResult<ResultSet> {
        match self {
            Self::ResultSet(set) => Ok(set),
            Self::RowsAffected(_) => Err(crate::error::DbError::query(
                "Statement did not produce a result set",
            )),
        }
    }
}
