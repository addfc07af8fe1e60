//! Connection lifecycle management.
//!
//! The server holds at most one database connection. It is opened once at
//! startup and released once at shutdown:
//!
//! `Uninitialized -> Connecting -> {Ready | Degraded} -> Closed`
//!
//! A failed startup connect leaves the manager `Degraded`. The process keeps
//! serving, and every tool that needs the connection reports it as
//! unavailable. There is no reconnect.
//!
//! Access to the connection is serialized: each bridge job locks it for the
//! whole of one tool's driver work.

use crate::config::DatabaseConfig;
use crate::db::bridge::BlockingBridge;
use crate::db::driver::{DbConnection, OdbcBackend};
use crate::error::{DbError, DbResult};
use crate::models::LifecycleState;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Extra time allowed on top of the driver login timeout before the manager
/// stops waiting for a connect attempt.
const CONNECT_GRACE: Duration = Duration::from_secs(5);

/// The live connection. `None` once it has been released.
pub type SharedConnection = Arc<Mutex<Option<Box<dyn DbConnection>>>>;

struct Inner {
    state: LifecycleState,
    connection: Option<SharedConnection>,
}

pub struct ConnectionManager {
    config: DatabaseConfig,
    backend: Arc<dyn OdbcBackend>,
    bridge: BlockingBridge,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("config", &self.config)
            .field("bridge", &self.bridge)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    pub fn new(
        config: DatabaseConfig,
        backend: Arc<dyn OdbcBackend>,
        bridge: BlockingBridge,
    ) -> Self {
        Self {
            config,
            backend,
            bridge,
            inner: RwLock::new(Inner {
                state: LifecycleState::Uninitialized,
                connection: None,
            }),
        }
    }

    /// Attempt the startup connection.
    ///
    /// Never fails: a connect error is logged and leaves the manager degraded.
    /// Only the first call does anything; later calls return the current state.
    pub async fn start(&self) -> LifecycleState {
        {
            let mut inner = self.inner.write().await;
            if inner.state != LifecycleState::Uninitialized {
                warn!(state = %inner.state, "Connection already started");
                return inner.state;
            }
            inner.state = LifecycleState::Connecting;
        }

        info!(
            server = %self.config.server,
            database = %self.config.database,
            driver = %self.config.driver_name,
            timeout_secs = self.config.connect_timeout.as_secs(),
            "Connecting to database"
        );
        debug!(
            connection_string = %self.config.redacted_connection_string(),
            "Connection string"
        );

        let result = match self.config.validate() {
            Err(message) => Err(DbError::connection_setup(
                message,
                "Set SQL_SERVER and the other SQL_* settings, then restart the server",
            )),
            Ok(()) => self.open().await,
        };

        let mut inner = self.inner.write().await;
        if inner.state == LifecycleState::Closed {
            // Shutdown raced the connect attempt
            drop(inner);
            if let Ok(conn) = result {
                self.release(Arc::new(Mutex::new(Some(conn)))).await;
            }
            return LifecycleState::Closed;
        }

        match result {
            Ok(conn) => {
                inner.connection = Some(Arc::new(Mutex::new(Some(conn))));
                inner.state = LifecycleState::Ready;
                info!(
                    server = %self.config.server,
                    database = %self.config.database,
                    "Connected successfully"
                );
            }
            Err(e) => {
                inner.state = LifecycleState::Degraded;
                error!(
                    kind = e.kind(),
                    error = %e,
                    suggestion = e.suggestion().unwrap_or_default(),
                    "Database connection failed; continuing without a connection"
                );
            }
        }
        inner.state
    }

    async fn open(&self) -> DbResult<Box<dyn DbConnection>> {
        let backend = Arc::clone(&self.backend);
        let config = self.config.clone();
        let attempt = self
            .bridge
            .submit("connect", move || backend.connect(&config));

        let limit = self.config.connect_timeout.saturating_add(CONNECT_GRACE);
        match tokio::time::timeout(limit, attempt).await {
            Ok(result) => result,
            Err(_) => Err(DbError::timeout("connect", limit.as_secs())),
        }
    }

    /// The connection, if one is held.
    pub async fn connection(&self) -> Option<SharedConnection> {
        self.inner.read().await.connection.clone()
    }

    /// `ConnectionUnavailable` unless a connection is held.
    pub async fn ensure_connected(&self) -> DbResult<()> {
        match self.connection().await {
            Some(_) => Ok(()),
            None => Err(DbError::ConnectionUnavailable),
        }
    }

    pub async fn state(&self) -> LifecycleState {
        self.inner.read().await.state
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn bridge(&self) -> &BlockingBridge {
        &self.bridge
    }

    /// Run `work` against the connection in a single bridge job.
    ///
    /// Returns `ConnectionUnavailable` without submitting anything when no
    /// connection is held.
    pub async fn with_connection<F, T>(&self, operation: &'static str, work: F) -> DbResult<T>
    where
        F: FnOnce(&mut dyn DbConnection) -> DbResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let Some(shared) = self.connection().await else {
            return Err(DbError::ConnectionUnavailable);
        };

        self.bridge
            .submit(operation, move || {
                let mut guard = shared.blocking_lock();
                match guard.as_mut() {
                    Some(conn) => work(conn.as_mut()),
                    None => Err(DbError::ConnectionUnavailable),
                }
            })
            .await
    }

    /// Driver names known to the driver manager. Needs no connection.
    pub async fn list_drivers(&self) -> DbResult<Vec<String>> {
        let backend = Arc::clone(&self.backend);
        self.bridge
            .submit("list_odbc_drivers", move || backend.drivers())
            .await
    }

    /// Release the connection and move to `Closed`.
    ///
    /// Idempotent. Returns `true` for the call that performed the transition.
    pub async fn close(&self) -> bool {
        let connection = {
            let mut inner = self.inner.write().await;
            if inner.state == LifecycleState::Closed {
                debug!("Connection manager already closed");
                return false;
            }
            inner.state = LifecycleState::Closed;
            inner.connection.take()
        };

        match connection {
            Some(shared) => self.release(shared).await,
            None => info!("No database connection to close"),
        }
        true
    }

    async fn release(&self, shared: SharedConnection) {
        let job = self.bridge.submit("close", move || {
            // Waits for any in-flight job, then disconnects on drop
            let conn = shared.blocking_lock().take();
            drop(conn);
            Ok(())
        });

        let limit = self.config.close_timeout;
        match tokio::time::timeout(limit, job).await {
            Ok(Ok(())) => info!("Database connection closed"),
            Ok(Err(e)) => {
                warn!(kind = e.kind(), error = %e, "Error while closing database connection")
            }
            Err(_) => warn!(
                timeout_secs = limit.as_secs(),
                "In-flight database work did not finish; abandoning the connection"
            ),
        }
    }

    /// Drive `serve` to completion, then close the connection.
    ///
    /// The connection is released whether `serve` returns normally, returns
    /// an error, or panics. A panic is resumed after the release.
    pub async fn scoped<F, T>(&self, serve: F) -> T
    where
        F: Future<Output = T>,
    {
        let outcome = AssertUnwindSafe(serve).catch_unwind().await;
        self.close().await;
        match outcome {
            Ok(value) => value,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}
