//! In-memory ODBC backend for integration tests.
//!
//! Understands just enough SQL for the tool catalog: the catalog views,
//! `SELECT @@VERSION`, the database summary query, `SELECT * FROM t`,
//! `SELECT COUNT(*) FROM t`, `INSERT INTO t VALUES (...)` and `DELETE FROM t`.
//! Writes go to a working copy that `commit` publishes and `rollback` discards.

#![allow(dead_code)]

use odbc_mcp_server::config::{Config, DatabaseConfig};
use odbc_mcp_server::db::{BlockingBridge, BridgeConfig, ConnectionManager, DbConnection, OdbcBackend};
use odbc_mcp_server::error::{DbError, DbResult};
use odbc_mcp_server::models::{ColumnDescriptor, ResultSet, SqlValue, StatementOutcome};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_SERVER: &str = "localhost-test";
pub const TEST_USER: &str = "mcp";
pub const SAMPLE_VERSION: &str = "Microsoft SQL Server 2019 (RTM-CU18) (KB5017593) - 15.0.4261.1 (X64)\n\tSep 12 2022 15:07:06\n\tCopyright (C) 2019 Microsoft Corporation\n\tDeveloper Edition (64-bit) on Linux (Ubuntu 20.04.5 LTS) <X64>";

#[derive(Debug, Clone)]
struct Table {
    name: String,
    columns: Vec<(String, String, Option<i64>)>,
    rows: Vec<Vec<SqlValue>>,
}

#[derive(Debug, Default)]
struct Database {
    committed: BTreeMap<String, Table>,
    working: BTreeMap<String, Table>,
}

/// Counters observed by tests.
#[derive(Debug, Default)]
pub struct Stats {
    pub connects: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub closes: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
    executed: Mutex<Vec<(String, Vec<String>)>>,
}

impl Stats {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Statements in execution order, with their parameters.
    pub fn executed(&self) -> Vec<(String, Vec<String>)> {
        self.executed.lock().unwrap().clone()
    }

    pub fn last_sql(&self) -> Option<String> {
        self.executed.lock().unwrap().last().map(|(sql, _)| sql.clone())
    }
}

#[derive(Debug, Clone, Default)]
struct Behavior {
    fail_connect: bool,
    fail_on: Option<String>,
    panic_on: Option<String>,
    delay: Option<Duration>,
    drivers: Vec<String>,
    version: String,
    database_name: String,
}

#[derive(Clone)]
pub struct MemoryBackend {
    db: Arc<Mutex<Database>>,
    stats: Arc<Stats>,
    behavior: Behavior,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            db: Arc::new(Mutex::new(Database::default())),
            stats: Arc::new(Stats::default()),
            behavior: Behavior {
                drivers: vec![
                    "ODBC Driver 17 for SQL Server".to_string(),
                    "SQL Server".to_string(),
                ],
                version: SAMPLE_VERSION.to_string(),
                database_name: "Demo".to_string(),
                ..Behavior::default()
            },
        }
    }

    /// `columns` are `(name, data type, character maximum length)`.
    pub fn with_table(
        self,
        name: &str,
        columns: &[(&str, &str, Option<i64>)],
        rows: Vec<Vec<SqlValue>>,
    ) -> Self {
        let table = Table {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|(n, t, l)| (n.to_string(), t.to_string(), *l))
                .collect(),
            rows,
        };
        {
            let mut db = self.db.lock().unwrap();
            db.committed.insert(key(name), table.clone());
            db.working.insert(key(name), table);
        }
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.behavior.version = version.to_string();
        self
    }

    pub fn failing_connect(mut self) -> Self {
        self.behavior.fail_connect = true;
        self
    }

    /// Statements containing `needle` apply their effect, then fail.
    pub fn fail_on(mut self, needle: &str) -> Self {
        self.behavior.fail_on = Some(needle.to_string());
        self
    }

    /// Statements containing `needle` panic inside the driver.
    pub fn panic_on(mut self, needle: &str) -> Self {
        self.behavior.panic_on = Some(needle.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.behavior.delay = Some(delay);
        self
    }

    pub fn stats(&self) -> Arc<Stats> {
        Arc::clone(&self.stats)
    }

    pub fn committed_rows(&self, table: &str) -> usize {
        self.db
            .lock()
            .unwrap()
            .committed
            .get(&key(table))
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }
}

impl OdbcBackend for MemoryBackend {
    fn connect(&self, _config: &DatabaseConfig) -> DbResult<Box<dyn DbConnection>> {
        if self.behavior.fail_connect {
            return Err(DbError::connection_setup(
                "[08001] [Microsoft][ODBC Driver 17 for SQL Server]Login timeout expired",
                "Check that the server is reachable",
            ));
        }
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            db: Arc::clone(&self.db),
            stats: Arc::clone(&self.stats),
            behavior: self.behavior.clone(),
        }))
    }

    fn drivers(&self) -> DbResult<Vec<String>> {
        Ok(self.behavior.drivers.clone())
    }
}

pub struct MemoryConnection {
    db: Arc<Mutex<Database>>,
    stats: Arc<Stats>,
    behavior: Behavior,
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl DbConnection for MemoryConnection {
    fn execute(&mut self, sql: &str, params: &[String]) -> DbResult<StatementOutcome> {
        self.stats
            .executed
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));

        if let Some(needle) = &self.behavior.panic_on {
            if sql.contains(needle.as_str()) {
                panic!("driver crashed on '{}'", needle);
            }
        }

        let now = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.behavior.delay {
            std::thread::sleep(delay);
        }
        let outcome = self.run(sql, params);
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);

        let outcome = outcome?;
        if let Some(needle) = &self.behavior.fail_on {
            if sql.contains(needle.as_str()) {
                return Err(DbError::query(format!(
                    "Violation of PRIMARY KEY constraint while executing '{}'",
                    needle
                )));
            }
        }
        Ok(outcome)
    }

    fn commit(&mut self) -> DbResult<()> {
        let mut db = self.db.lock().unwrap();
        db.committed = db.working.clone();
        self.stats.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&mut self) -> DbResult<()> {
        let mut db = self.db.lock().unwrap();
        db.working = db.committed.clone();
        self.stats.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl MemoryConnection {
    fn run(&mut self, sql: &str, params: &[String]) -> DbResult<StatementOutcome> {
        let trimmed = sql.trim();
        let upper = trimmed.to_uppercase();
        let mut db = self.db.lock().unwrap();

        if upper == "SELECT @@VERSION" {
            return Ok(single_row(
                &[("", "nvarchar")],
                vec![SqlValue::Text(self.behavior.version.clone())],
            ));
        }

        if upper.contains("DB_NAME()") {
            let count = db.working.len() as i64;
            return Ok(single_row(
                &[
                    ("DatabaseName", "nvarchar"),
                    ("CurrentDateTime", "varchar"),
                    ("TableCount", "int"),
                ],
                vec![
                    SqlValue::Text(self.behavior.database_name.clone()),
                    SqlValue::Text("2024-05-01 12:00:00".to_string()),
                    SqlValue::Int(count),
                ],
            ));
        }

        if upper.contains("FROM INFORMATION_SCHEMA.TABLES") {
            let mut names: Vec<String> = db.working.values().map(|t| t.name.clone()).collect();
            names.sort();
            return Ok(StatementOutcome::ResultSet(ResultSet::new(
                vec![ColumnDescriptor::new("TABLE_NAME", "nvarchar")],
                names.into_iter().map(|n| vec![SqlValue::Text(n)]).collect(),
            )));
        }

        if upper.contains("FROM INFORMATION_SCHEMA.COLUMNS") {
            let (schema, table) = match params {
                [table] => (None, table.as_str()),
                [schema, table] => (Some(schema.as_str()), table.as_str()),
                _ => return Err(DbError::query("COLUMNS lookup expects bound parameters")),
            };
            let rows = match (schema, db.working.get(&table.to_lowercase())) {
                (Some(s), _) if !s.eq_ignore_ascii_case("dbo") => Vec::new(),
                (_, Some(t)) => t
                    .columns
                    .iter()
                    .map(|(name, data_type, len)| {
                        vec![
                            SqlValue::Text(name.clone()),
                            SqlValue::Text(data_type.clone()),
                            len.map(SqlValue::Int).unwrap_or(SqlValue::Null),
                        ]
                    })
                    .collect(),
                _ => Vec::new(),
            };
            return Ok(StatementOutcome::ResultSet(ResultSet::new(
                vec![
                    ColumnDescriptor::new("COLUMN_NAME", "nvarchar"),
                    ColumnDescriptor::new("DATA_TYPE", "nvarchar"),
                    ColumnDescriptor::new("CHARACTER_MAXIMUM_LENGTH", "int"),
                ],
                rows,
            )));
        }

        if let Some(rest) = strip_prefix_ci(trimmed, "SELECT COUNT(*) FROM ") {
            let table = lookup(&db.working, rest)?;
            return Ok(single_row(
                &[("", "int")],
                vec![SqlValue::Int(table.rows.len() as i64)],
            ));
        }

        if let Some(rest) = strip_prefix_ci(trimmed, "SELECT * FROM ") {
            let table = lookup(&db.working, rest)?;
            return Ok(StatementOutcome::ResultSet(ResultSet::new(
                table
                    .columns
                    .iter()
                    .map(|(n, t, _)| ColumnDescriptor::new(n.clone(), t.clone()))
                    .collect(),
                table.rows.clone(),
            )));
        }

        if let Some(rest) = strip_prefix_ci(trimmed, "INSERT INTO ") {
            let (name, values) = rest
                .split_once(" VALUES ")
                .or_else(|| rest.split_once(" values "))
                .ok_or_else(|| DbError::query("Incorrect syntax near 'INSERT'."))?;
            let values = parse_values(values)?;
            let table = lookup_mut(&mut db.working, name)?;
            if values.len() != table.columns.len() {
                return Err(DbError::query(
                    "Column name or number of supplied values does not match table definition.",
                ));
            }
            table.rows.push(values);
            return Ok(StatementOutcome::RowsAffected(1));
        }

        if let Some(rest) = strip_prefix_ci(trimmed, "DELETE FROM ") {
            let table = lookup_mut(&mut db.working, rest)?;
            let affected = table.rows.len() as i64;
            table.rows.clear();
            return Ok(StatementOutcome::RowsAffected(affected));
        }

        Err(DbError::query(format!(
            "Incorrect syntax near '{}'.",
            trimmed.split_whitespace().next().unwrap_or_default()
        )))
    }
}

fn single_row(columns: &[(&str, &str)], values: Vec<SqlValue>) -> StatementOutcome {
    StatementOutcome::ResultSet(ResultSet::new(
        columns
            .iter()
            .map(|(n, t)| ColumnDescriptor::new(*n, *t))
            .collect(),
        vec![values],
    ))
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(text[prefix.len()..].trim())
    } else {
        None
    }
}

/// `[dbo].[Name]`, `dbo.Name` and `Name` all address the same table.
fn key(name: &str) -> String {
    let cleaned = name.trim().trim_end_matches(';').replace(['[', ']'], "");
    let cleaned = cleaned.strip_prefix("dbo.").unwrap_or(&cleaned);
    cleaned.to_lowercase()
}

fn lookup<'a>(tables: &'a BTreeMap<String, Table>, name: &str) -> DbResult<&'a Table> {
    tables
        .get(&key(name))
        .ok_or_else(|| DbError::query(format!("Invalid object name '{}'.", name.trim())))
}

fn lookup_mut<'a>(tables: &'a mut BTreeMap<String, Table>, name: &str) -> DbResult<&'a mut Table> {
    tables
        .get_mut(&key(name))
        .ok_or_else(|| DbError::query(format!("Invalid object name '{}'.", name.trim())))
}

fn parse_values(text: &str) -> DbResult<Vec<SqlValue>> {
    let inner = text
        .trim()
        .trim_end_matches(';')
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(|| DbError::query("Incorrect syntax near 'VALUES'."))?;
    Ok(inner
        .split(',')
        .map(|raw| {
            let raw = raw.trim();
            if raw.eq_ignore_ascii_case("NULL") {
                SqlValue::Null
            } else if let Some(s) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
                SqlValue::Text(s.to_string())
            } else if let Ok(n) = raw.parse::<i64>() {
                SqlValue::Int(n)
            } else {
                SqlValue::Text(raw.to_string())
            }
        })
        .collect())
}

/// `Table_1` and `Orders`, both `(Id int, Name varchar(50))`.
pub fn sample_backend() -> MemoryBackend {
    let columns: &[(&str, &str, Option<i64>)] =
        &[("Id", "int", None), ("Name", "varchar", Some(50))];
    MemoryBackend::new()
        .with_table(
            "Table_1",
            columns,
            vec![vec![SqlValue::Int(1), SqlValue::Text("alpha".to_string())]],
        )
        .with_table(
            "Orders",
            columns,
            vec![
                vec![SqlValue::Int(1), SqlValue::Text("first".to_string())],
                vec![SqlValue::Int(2), SqlValue::Text("second".to_string())],
            ],
        )
}

pub fn test_config() -> DatabaseConfig {
    Config {
        server: TEST_SERVER.to_string(),
        database: "Demo".to_string(),
        user: TEST_USER.to_string(),
        password: "secret".to_string(),
        connect_timeout: 2,
        ..Config::default()
    }
    .database_config()
}

pub fn manager_with(backend: &MemoryBackend, bridge: BridgeConfig) -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::new(
        test_config(),
        Arc::new(backend.clone()),
        BlockingBridge::new(bridge),
    ))
}

/// Manager that has already run its startup connect.
pub async fn started_manager(backend: &MemoryBackend) -> Arc<ConnectionManager> {
    let manager = manager_with(backend, BridgeConfig::default());
    manager.start().await;
    manager
}
