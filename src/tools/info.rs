//! Server and driver information tools.
//!
//! `database_info` gathers its facts in a single bridge job. The server and
//! user it reports come from the configuration, not from the database.
//! `list_odbc_drivers` asks the driver manager and works without a
//! connection.

use crate::db::ConnectionManager;
use crate::error::{DbError, DbResult};
use crate::models::SqlValue;
use crate::tools::format::{first_line, join_drivers};
use std::sync::Arc;
use tracing::info;

const VERSION_SQL: &str = "SELECT @@VERSION";

const DATABASE_SUMMARY_SQL: &str = "SELECT DB_NAME() AS DatabaseName, \
     CONVERT(VARCHAR(50), GETDATE(), 120) AS CurrentDateTime, \
     (SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE') AS TableCount";

/// Facts reported by `database_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub server: String,
    pub user: String,
    pub database: String,
    /// Full `@@VERSION` text; only its first line is rendered
    pub version: String,
    pub current_time: String,
    pub table_count: String,
}

impl DatabaseInfo {
    pub fn to_text(&self) -> String {
        format!(
            "Database Information:\n\
             Server: {}\n\
             Database: {}\n\
             User: {}\n\
             Server Version: {}\n\
             Current Server Time: {}\n\
             Number of Tables: {}",
            self.server,
            self.database,
            self.user,
            first_line(&self.version),
            self.current_time,
            self.table_count,
        )
    }
}

/// Text for a successful `list_odbc_drivers`.
pub fn drivers_text(drivers: &[String]) -> String {
    format!("Available ODBC drivers: {}", join_drivers(drivers))
}

fn first_row_cell(values: &[Vec<SqlValue>], col: usize, what: &str) -> DbResult<String> {
    values
        .first()
        .and_then(|row| row.get(col))
        .map(SqlValue::to_display_string)
        .ok_or_else(|| DbError::query(format!("No {} returned", what)))
}

pub struct InfoToolHandler {
    connection_manager: Arc<ConnectionManager>,
}

impl InfoToolHandler {
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self { connection_manager }
    }

    pub async fn database_info(&self) -> DbResult<DatabaseInfo> {
        let config = self.connection_manager.config();
        let server = config.server.clone();
        let user = config.user.clone();

        let info = self
            .connection_manager
            .with_connection("database_info", move |conn| {
                let version = conn.execute(VERSION_SQL, &[])?.into_result_set()?;
                let summary = conn.execute(DATABASE_SUMMARY_SQL, &[])?.into_result_set()?;
                Ok(DatabaseInfo {
                    server,
                    user,
                    version: first_row_cell(&version.rows, 0, "server version")?,
                    database: first_row_cell(&summary.rows, 0, "database name")?,
                    current_time: first_row_cell(&summary.rows, 1, "server time")?,
                    table_count: first_row_cell(&summary.rows, 2, "table count")?,
                })
            })
            .await?;

        info!(database = %info.database, "Collected database info");
        Ok(info)
    }

    pub async fn list_odbc_drivers(&self) -> DbResult<Vec<String>> {
        let drivers = self.connection_manager.list_drivers().await?;
        info!(driver_count = drivers.len(), "Listed ODBC drivers");
        Ok(drivers)
    }
}
