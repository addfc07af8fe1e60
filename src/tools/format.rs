//! Output formatting utilities for MCP tools.
//!
//! Tool results are plain text. This module renders result sets as JSON
//! arrays of row objects and builds the line-oriented texts used by
//! `describe_table`, `list_odbc_drivers` and `database_info`.

use crate::models::{ColumnDescriptor, ResultSet, SqlValue};
use serde_json::{Map, Value as JsonValue};

/// One row as an object keyed by column name, in column order.
///
/// Duplicate column names collapse; the last column wins.
pub fn row_to_map(columns: &[ColumnDescriptor], row: &[SqlValue]) -> Map<String, JsonValue> {
    columns
        .iter()
        .zip(row)
        .map(|(col, value)| (col.name.clone(), value.to_json()))
        .collect()
}

pub fn rows_to_json(result_set: &ResultSet) -> JsonValue {
    JsonValue::Array(
        result_set
            .rows
            .iter()
            .map(|row| JsonValue::Object(row_to_map(&result_set.columns, row)))
            .collect(),
    )
}

/// Column line for `describe_table`: `name (type)` or `name (type(len))`.
///
/// A length of `-1` is the catalog's marker for `(max)` types. Zero or a
/// missing length means the type has no length.
pub fn describe_entry(column: &ColumnDescriptor) -> String {
    let (name, data_type) = (&column.name, &column.type_name);
    match column.max_length {
        Some(-1) => format!("{} ({}(max))", name, data_type),
        Some(len) if len > 0 => format!("{} ({}({}))", name, data_type, len),
        _ => format!("{} ({})", name, data_type),
    }
}

pub fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

pub fn join_drivers(drivers: &[String]) -> String {
    drivers.join(", ")
}

/// Render a JSON array of strings, e.g. table names.
pub fn string_array(items: &[String]) -> String {
    JsonValue::Array(items.iter().cloned().map(JsonValue::String).collect()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ResultSet {
        ResultSet::new(
            vec![
                ColumnDescriptor::new("Id", "int"),
                ColumnDescriptor::new("Name", "varchar"),
                ColumnDescriptor::new("Amount", "decimal"),
            ],
            vec![
                vec![
                    SqlValue::Int(1),
                    SqlValue::Text("alpha".into()),
                    SqlValue::Text("10.50".into()),
                ],
                vec![SqlValue::Int(2), SqlValue::Null, SqlValue::Null],
            ],
        )
    }

    #[test]
    fn test_rows_to_json_keeps_column_order() {
        let rendered = rows_to_json(&sample()).to_string();
        assert_eq!(
            rendered,
            r#"[{"Id":1,"Name":"alpha","Amount":"10.50"},{"Id":2,"Name":null,"Amount":null}]"#
        );
    }

    #[test]
    fn test_row_to_map_duplicate_names() {
        let columns = vec![ColumnDescriptor::new("x", "int"), ColumnDescriptor::new("x", "int")];
        let map = row_to_map(&columns, &[SqlValue::Int(1), SqlValue::Int(2)]);
        assert_eq!(map.len(), 1);
        assert_eq!(map["x"], json!(2));
    }

    #[test]
    fn test_describe_entry() {
        let column = |name: &str, ty: &str, len: Option<i64>| {
            describe_entry(&ColumnDescriptor::new(name, ty).with_max_length(len))
        };
        assert_eq!(column("Id", "int", None), "Id (int)");
        assert_eq!(column("Name", "varchar", Some(50)), "Name (varchar(50))");
        assert_eq!(column("Notes", "nvarchar", Some(-1)), "Notes (nvarchar(max))");
        assert_eq!(column("Flag", "bit", Some(0)), "Flag (bit)");
    }

    #[test]
    fn test_first_line() {
        assert_eq!(
            first_line("Microsoft SQL Server 2019\n\tCopyright\n"),
            "Microsoft SQL Server 2019"
        );
        assert_eq!(first_line(""), "");
    }

    #[test]
    fn test_join_and_array() {
        let names = vec!["SQL Server".to_string(), "ODBC Driver 17 for SQL Server".to_string()];
        assert_eq!(join_drivers(&names), "SQL Server, ODBC Driver 17 for SQL Server");
        assert_eq!(string_array(&names[..1]), r#"["SQL Server"]"#);
        assert_eq!(join_drivers(&[]), "");
    }
}
