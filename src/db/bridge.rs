//! Blocking-call bridge.
//!
//! Driver calls block the calling thread for the whole network round trip.
//! The bridge moves each such call onto tokio's blocking thread pool and
//! hands the result back to the async caller, so the request-serving loop is
//! never stalled by database I/O.
//!
//! By default there is no bound on concurrent jobs and no wait limit, and a
//! stalled driver call occupies its worker indefinitely. Both can be turned on
//! through [`BridgeConfig`]. A timed-out job cannot be cancelled: the caller
//! stops waiting and gets a `Timeout` error while the worker runs to
//! completion in the background (still holding its permit, if bounded).
//!
//! Jobs are never retried.

use crate::error::{DbError, DbResult, panic_message};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

/// Limits applied to blocking jobs. Both unset by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Maximum jobs running at once; further submissions wait for a slot.
    pub max_in_flight: Option<usize>,
    /// How long a caller waits for its job before giving up.
    pub call_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct BlockingBridge {
    permits: Option<Arc<Semaphore>>,
    call_timeout: Option<Duration>,
    submitted: Arc<AtomicU64>,
}

impl BlockingBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            permits: config
                .max_in_flight
                .map(|limit| Arc::new(Semaphore::new(limit))),
            call_timeout: config.call_timeout,
            submitted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bridge with no bound and no timeout.
    pub fn unbounded() -> Self {
        Self::new(BridgeConfig::default())
    }

    /// Number of jobs submitted so far.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Run `job` on a blocking worker and await its result.
    ///
    /// A panic inside the job is returned as an `Unexpected` error.
    pub async fn submit<F, T>(&self, operation: &'static str, job: F) -> DbResult<T>
    where
        F: FnOnce() -> DbResult<T> + Send + 'static,
        T: Send + 'static,
    {
        self.submitted.fetch_add(1, Ordering::Relaxed);

        let permit = match &self.permits {
            Some(semaphore) => Some(
                Arc::clone(semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| DbError::unexpected("Blocking bridge is shut down"))?,
            ),
            None => None,
        };

        debug!(operation, "Submitting blocking job");
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        });

        let joined = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(
                        operation,
                        timeout_secs = limit.as_secs(),
                        "Blocking job exceeded wait limit; worker left running"
                    );
                    return Err(DbError::timeout(operation, limit.as_secs()));
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                let message = panic_message(join_err.into_panic().as_ref());
                error!(operation, panic = %message, "Blocking job panicked");
                Err(DbError::unexpected(format!(
                    "Panic in {}: {}",
                    operation, message
                )))
            }
            Err(join_err) => {
                error!(operation, error = %join_err, "Blocking job did not complete");
                Err(DbError::unexpected(format!(
                    "Worker for {} failed: {}",
                    operation, join_err
                )))
            }
        }
    }
}

impl Default for BlockingBridge {
    fn default() -> Self {
        Self::unbounded()
    }
}
