//! # Transactions with Retry
//!
//! Every ledger operation runs as one SQLite transaction. Conflicts abort
//! the transaction and the whole unit of work is run again.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  attempt n                                                              │
//! │    BEGIN                                                                │
//! │    work(conn) ──► Ok  ──► COMMIT ──► done                              │
//! │       │                     │                                           │
//! │       │ Busy / StaleWrite   │ Busy                                      │
//! │       ▼                     ▼                                           │
//! │    ROLLBACK (drop) ──► sleep(backoff × n) ──► attempt n + 1             │
//! │                                                                         │
//! │  n == max_attempts  ──► ConcurrencyConflict { operation, attempts }    │
//! │  any other error    ──► returned as is, nothing committed              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The unit of work receives a fresh connection borrow on each attempt, so
//! it must own its inputs: clone them into the returned future.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// Boxed future of one transaction attempt, borrowing its connection.
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = DbResult<T>> + Send + 'c>>;

/// How often and how patiently a contended operation is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Delay before attempt `attempt + 1`.
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(5, Duration::from_millis(20))
    }
}

/// Runs `work` inside a transaction, retrying on `Busy` and `StaleWrite`.
///
/// ## Example
/// ```rust,ignore
/// let order = with_retry(db.pool(), "create_order", policy, move |conn| {
///     let request = request.clone();
///     Box::pin(async move { insert_everything(conn, &request).await })
/// })
/// .await?;
/// ```
pub async fn with_retry<T, F>(
    pool: &SqlitePool,
    operation: &str,
    policy: RetryPolicy,
    mut work: F,
) -> DbResult<T>
where
    F: for<'c> FnMut(&'c mut SqliteConnection) -> TxFuture<'c, T> + Send,
    T: Send,
{
    let mut attempt = 0;
    loop {
        attempt += 1;

        match run_once(pool, &mut work).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Transaction committed after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                warn!(operation, attempt, error = %err, "Transaction conflict, retrying");
                tokio::time::sleep(policy.delay(attempt)).await;
            }
            Err(err) if err.is_retryable() => {
                warn!(operation, attempts = attempt, error = %err, "Retries exhausted");
                return Err(DbError::ConcurrencyConflict {
                    operation: operation.to_string(),
                    attempts: attempt,
                });
            }
            Err(err) => return Err(err),
        }
    }
}

async fn run_once<T, F>(pool: &SqlitePool, work: &mut F) -> DbResult<T>
where
    F: for<'c> FnMut(&'c mut SqliteConnection) -> TxFuture<'c, T> + Send,
    T: Send,
{
    let mut tx = pool.begin().await?;
    // Dropping `tx` on the error path rolls back.
    let value = work(&mut *tx).await?;
    tx.commit().await?;
    Ok(value)
}
