//! Driver seam.
//!
//! Everything behind these traits is blocking. Callers never invoke them
//! directly from async code; all calls go through [`BlockingBridge`].
//!
//! [`BlockingBridge`]: crate::db::BlockingBridge

use crate::config::DatabaseConfig;
use crate::error::DbResult;
use crate::models::StatementOutcome;

/// A live connection to the database.
///
/// Statement handles (cursors) opened by `execute` live only for the duration
/// of that call; an implementation must release them before returning on every
/// path, including errors.
pub trait DbConnection: Send {
    /// Execute one statement with positional string parameters bound to `?`
    /// markers, fetching the full result set if it produces one.
    fn execute(&mut self, sql: &str, params: &[String]) -> DbResult<StatementOutcome>;

    fn commit(&mut self) -> DbResult<()>;

    fn rollback(&mut self) -> DbResult<()>;
}

/// Opens connections and answers driver-manager questions.
pub trait OdbcBackend: Send + Sync {
    /// Open a connection. Dropping the returned value disconnects.
    fn connect(&self, config: &DatabaseConfig) -> DbResult<Box<dyn DbConnection>>;

    /// Names of the drivers registered with the driver manager.
    fn drivers(&self) -> DbResult<Vec<String>>;
}
