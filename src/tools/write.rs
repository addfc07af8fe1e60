//! Write operation tool.
//!
//! This module implements the `execute_nonquery` MCP tool. The statement is
//! executed and committed in one bridge job. If either step fails the
//! transaction is rolled back before the failure is reported, so a failed
//! call leaves no partial changes behind.

use crate::db::{ConnectionManager, DbConnection};
use crate::error::{DbError, DbResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Text for a successful `execute_nonquery`.
pub fn execute_text(rows_affected: i64) -> String {
    format!("Operation successful. Rows affected: {}", rows_affected)
}

pub struct WriteToolHandler {
    connection_manager: Arc<ConnectionManager>,
}

impl WriteToolHandler {
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self { connection_manager }
    }

    /// Execute `sql` and commit. Returns the affected-row count (`-1` if unknown).
    pub async fn execute_nonquery(&self, sql: &str) -> DbResult<i64> {
        let sql = sql.to_string();
        debug!(sql = %sql, "Executing statement");

        let rows_affected = self
            .connection_manager
            .with_connection("execute_nonquery", move |conn| {
                execute_and_commit(conn, &sql)
            })
            .await?;

        info!(rows_affected, "Statement committed");
        Ok(rows_affected)
    }
}

fn execute_and_commit(conn: &mut dyn DbConnection, sql: &str) -> DbResult<i64> {
    let attempt = conn.execute(sql, &[]).and_then(|outcome| {
        let rows_affected = outcome.rows_affected();
        conn.commit()?;
        Ok(rows_affected)
    });

    match attempt {
        Ok(rows_affected) => Ok(rows_affected),
        Err(failure) => {
            if let Err(rollback_err) = conn.rollback() {
                warn!(
                    error = %failure,
                    rollback_error = %rollback_err,
                    "Rollback after failed statement also failed"
                );
                return Err(DbError::non_query(
                    format!("{}; {}", failure.detail(), rollback_err.detail()),
                    false,
                ));
            }
            warn!(kind = failure.kind(), error = %failure, "Statement failed; rolled back");
            Err(DbError::non_query(failure.detail(), true))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatementOutcome;

    #[derive(Default)]
    struct ScriptedConnection {
        fail_execute: bool,
        fail_commit: bool,
        fail_rollback: bool,
        calls: Vec<&'static str>,
    }

    impl DbConnection for ScriptedConnection {
        fn execute(&mut self, _sql: &str, _params: &[String]) -> DbResult<StatementOutcome> {
            self.calls.push("execute");
            if self.fail_execute {
                Err(DbError::query("Invalid object name 'Missing'."))
            } else {
                Ok(StatementOutcome::RowsAffected(2))
            }
        }

        fn commit(&mut self) -> DbResult<()> {
            self.calls.push("commit");
            if self.fail_commit {
                Err(DbError::non_query("Commit failed: deadlock", false))
            } else {
                Ok(())
            }
        }

        fn rollback(&mut self) -> DbResult<()> {
            self.calls.push("rollback");
            if self.fail_rollback {
                Err(DbError::query("Rollback failed: link down"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_success_commits() {
        let mut conn = ScriptedConnection::default();
        assert_eq!(execute_and_commit(&mut conn, "UPDATE t SET x = 1").unwrap(), 2);
        assert_eq!(conn.calls, vec!["execute", "commit"]);
    }

    #[test]
    fn test_execute_failure_rolls_back() {
        let mut conn = ScriptedConnection {
            fail_execute: true,
            ..Default::default()
        };
        let err = execute_and_commit(&mut conn, "DELETE FROM Missing").unwrap_err();
        assert_eq!(conn.calls, vec!["execute", "rollback"]);
        match err {
            DbError::NonQuery {
                message,
                rolled_back,
            } => {
                assert_eq!(message, "Invalid object name 'Missing'.");
                assert!(rolled_back);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_commit_failure_rolls_back() {
        let mut conn = ScriptedConnection {
            fail_commit: true,
            ..Default::default()
        };
        let err = execute_and_commit(&mut conn, "INSERT INTO t VALUES (1)").unwrap_err();
        assert_eq!(conn.calls, vec!["execute", "commit", "rollback"]);
        assert!(matches!(err, DbError::NonQuery { .. }));
    }

    #[test]
    fn test_rollback_failure_is_reported() {
        let mut conn = ScriptedConnection {
            fail_execute: true,
            fail_rollback: true,
            ..Default::default()
        };
        let err = execute_and_commit(&mut conn, "DELETE FROM t").unwrap_err();
        assert!(matches!(
            err,
            DbError::NonQuery {
                rolled_back: false,
                ..
            }
        ));
        assert_eq!(
            err.detail(),
            "Invalid object name 'Missing'.; Rollback failed: link down"
        );
    }

    #[test]
    fn test_execute_text() {
        assert_eq!(execute_text(3), "Operation successful. Rows affected: 3");
        assert_eq!(execute_text(-1), "Operation successful. Rows affected: -1");
    }
}
