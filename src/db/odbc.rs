//! ODBC backend built on `odbc-api`.
//!
//! All calls here block. They are only ever made from jobs submitted to the
//! blocking bridge.

use crate::config::DatabaseConfig;
use crate::db::driver::{DbConnection, OdbcBackend};
use crate::db::types::{categorize_type, decode_text};
use crate::error::{DbError, DbResult};
use crate::models::{ColumnDescriptor, ResultSet, StatementOutcome};
use odbc_api::{Connection, ConnectionOptions, Cursor, DataType, Environment, IntoParameter};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// The driver manager environment is process-wide and created on first use.
static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

fn environment() -> DbResult<&'static Environment> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env);
    }
    let env = Environment::new().map_err(|e| {
        DbError::connection_setup(
            format!("Failed to initialize ODBC environment: {}", e),
            "Make sure an ODBC driver manager (unixODBC or the Windows ODBC manager) is installed",
        )
    })?;
    Ok(ENVIRONMENT.get_or_init(|| env))
}

/// Production backend talking to the system ODBC driver manager.
#[derive(Debug, Default, Clone, Copy)]
pub struct OdbcDriver;

impl OdbcDriver {
    pub fn new() -> Self {
        Self
    }
}

impl OdbcBackend for OdbcDriver {
    fn connect(&self, config: &DatabaseConfig) -> DbResult<Box<dyn DbConnection>> {
        let env = environment()?;
        let login_timeout = u32::try_from(config.connect_timeout.as_secs()).unwrap_or(u32::MAX);

        let conn = env
            .connect_with_connection_string(
                &config.connection_string(),
                ConnectionOptions {
                    login_timeout_sec: Some(login_timeout),
                    ..Default::default()
                },
            )
            .map_err(|e| connect_error(e, config))?;

        // Writes only become durable through an explicit commit.
        conn.set_autocommit(false).map_err(|e| {
            DbError::connection_setup(
                format!("Failed to disable autocommit: {}", e),
                "The driver must support manual transactions",
            )
        })?;

        Ok(Box::new(OdbcConnection { conn }))
    }

    fn drivers(&self) -> DbResult<Vec<String>> {
        let env = environment()?;
        let drivers = env
            .drivers()
            .map_err(|e| DbError::query(format!("Failed to enumerate drivers: {}", e)))?;
        Ok(drivers.into_iter().map(|d| d.description).collect())
    }
}

fn connect_error(err: odbc_api::Error, config: &DatabaseConfig) -> DbError {
    let message = err.to_string();
    let lower = message.to_lowercase();

    let suggestion = if lower.contains("login failed") {
        "Check SQL_USER and SQL_PASSWORD".to_string()
    } else if lower.contains("timeout") || lower.contains("tcp provider") {
        format!(
            "Check that '{}' is reachable and accepts TCP connections",
            config.server
        )
    } else if lower.contains("can't open lib")
        || lower.contains("data source name not found")
        || lower.contains("driver not found")
    {
        format!(
            "Driver '{}' is not registered; install it or set SQL_DRIVER_NAME",
            config.driver_name
        )
    } else if lower.contains("ssl") || lower.contains("certificate") {
        "Review SQL_ENCRYPT and SQL_TRUST_SERVER_CERT".to_string()
    } else {
        "Verify the SQL_* connection settings".to_string()
    };

    DbError::connection_setup(message, suggestion)
}

/// One open connection with autocommit disabled.
pub struct OdbcConnection {
    conn: Connection<'static>,
}

impl DbConnection for OdbcConnection {
    fn execute(&mut self, sql: &str, params: &[String]) -> DbResult<StatementOutcome> {
        let mut stmt = self.conn.preallocate()?;

        // The cursor borrows the statement and must be gone before row_count.
        let fetched = {
            let cursor = match params {
                [] => stmt.execute(sql, ())?,
                [first] => stmt.execute(sql, &first.as_str().into_parameter())?,
                [first, second] => stmt.execute(
                    sql,
                    (
                        &first.as_str().into_parameter(),
                        &second.as_str().into_parameter(),
                    ),
                )?,
                _ => {
                    return Err(DbError::invalid_input(format!(
                        "At most 2 parameters are supported, got {}",
                        params.len()
                    )));
                }
            };
            cursor.map(fetch_result_set).transpose()?
        };

        if let Some(set) = fetched {
            return Ok(StatementOutcome::ResultSet(set));
        }

        let affected = stmt
            .row_count()?
            .and_then(|n| i64::try_from(n).ok())
            .unwrap_or(-1);
        Ok(StatementOutcome::RowsAffected(affected))
    }

    fn commit(&mut self) -> DbResult<()> {
        self.conn
            .commit()
            .map_err(|e| DbError::non_query(format!("Commit failed: {}", e), false))
    }

    fn rollback(&mut self) -> DbResult<()> {
        self.conn
            .rollback()
            .map_err(|e| DbError::query(format!("Rollback failed: {}", e)))
    }
}

impl Drop for OdbcConnection {
    fn drop(&mut self) {
        // Pending work that was never committed is discarded before disconnecting.
        if let Err(e) = self.conn.rollback() {
            warn!(error = %e, "Rollback before disconnect failed");
        }
        debug!("Disconnecting ODBC connection");
    }
}

fn fetch_result_set(mut cursor: impl Cursor) -> DbResult<ResultSet> {
    let column_count = u16::try_from(cursor.num_result_cols()?).unwrap_or(0);

    let mut columns = Vec::with_capacity(column_count as usize);
    for index in 1..=column_count {
        let name = cursor.col_name(index)?;
        let data_type = cursor.col_data_type(index)?;
        columns.push(ColumnDescriptor::new(name, type_name(&data_type)));
    }
    let categories: Vec<_> = columns
        .iter()
        .map(|c| categorize_type(&c.type_name))
        .collect();

    let mut rows = Vec::new();
    let mut buf: Vec<u16> = Vec::new();
    while let Some(mut row) = cursor.next_row()? {
        let mut values = Vec::with_capacity(columns.len());
        for (offset, category) in categories.iter().enumerate() {
            buf.clear();
            let index = offset as u16 + 1;
            // Wide text keeps non-ASCII data intact under narrow code pages.
            let text = if row.get_wide_text(index, &mut buf)? {
                Some(String::from_utf16_lossy(&buf))
            } else {
                None
            };
            values.push(decode_text(*category, text));
        }
        rows.push(values);
    }

    Ok(ResultSet::new(columns, rows))
}

/// SQL Server style name for a driver-reported column type.
fn type_name(data_type: &DataType) -> &'static str {
    match data_type {
        DataType::Bit { .. } => "bit",
        DataType::TinyInt { .. } => "tinyint",
        DataType::SmallInt { .. } => "smallint",
        DataType::Integer { .. } => "int",
        DataType::BigInt { .. } => "bigint",
        DataType::Real { .. } => "real",
        DataType::Float { .. } | DataType::Double { .. } => "float",
        DataType::Decimal { .. } => "decimal",
        DataType::Numeric { .. } => "numeric",
        DataType::Char { .. } => "char",
        DataType::WChar { .. } => "nchar",
        DataType::Varchar { .. } => "varchar",
        DataType::WVarchar { .. } => "nvarchar",
        DataType::LongVarchar { .. } => "text",
        DataType::Date { .. } => "date",
        DataType::Time { .. } => "time",
        DataType::Timestamp { .. } => "datetime2",
        DataType::Binary { .. } => "binary",
        DataType::Varbinary { .. } => "varbinary",
        DataType::LongVarbinary { .. } => "image",
        _ => "unknown",
    }
}
