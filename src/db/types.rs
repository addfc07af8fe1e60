//! Driver type mappings.
//!
//! Values are fetched from the driver as text and then decoded into
//! [`SqlValue`]s in two phases:
//! 1. `TypeCategory` classifies the column's type name into a logical category
//! 2. `decode_text` parses the fetched text according to that category
//!
//! Text that does not parse for its category is kept as text rather than
//! dropped, so nothing the driver returned is lost.

use crate::models::SqlValue;

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    /// Exact numerics stay textual to keep their precision
    Decimal,
    Boolean,
    Text,
    Binary,
    Unknown,
}

/// Classify a type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.trim().to_lowercase();

    // Decimal/Numeric/money - check first as exact numerics must not become floats
    if lower.contains("decimal") || lower.contains("numeric") || lower.contains("money") {
        return TypeCategory::Decimal;
    }

    if lower.contains("int") && !lower.contains("point") {
        return TypeCategory::Integer;
    }

    if lower == "bit" || lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower.contains("binary") || lower == "image" || lower == "rowversion" || lower == "timestamp"
    {
        return TypeCategory::Binary;
    }

    if lower.contains("char")
        || lower.contains("text")
        || lower.contains("date")
        || lower.contains("time")
        || lower == "uniqueidentifier"
        || lower == "xml"
    {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

/// Decode a fetched cell. `None` is SQL NULL.
pub fn decode_text(category: TypeCategory, text: Option<String>) -> SqlValue {
    let Some(text) = text else {
        return SqlValue::Null;
    };

    match category {
        TypeCategory::Integer => text
            .trim()
            .parse::<i64>()
            .map(SqlValue::Int)
            .unwrap_or(SqlValue::Text(text)),
        TypeCategory::Float => text
            .trim()
            .parse::<f64>()
            .map(SqlValue::Float)
            .unwrap_or(SqlValue::Text(text)),
        TypeCategory::Boolean => match text.trim() {
            "1" => SqlValue::Bool(true),
            "0" => SqlValue::Bool(false),
            other if other.eq_ignore_ascii_case("true") => SqlValue::Bool(true),
            other if other.eq_ignore_ascii_case("false") => SqlValue::Bool(false),
            _ => SqlValue::Text(text),
        },
        TypeCategory::Decimal
        | TypeCategory::Text
        | TypeCategory::Binary
        | TypeCategory::Unknown => SqlValue::Text(text),
    }
}
