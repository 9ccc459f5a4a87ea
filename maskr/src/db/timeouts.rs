//! Database query timeout helpers
//!
//! Every store call is bounded so a stalled connection cannot starve request handlers.

use super::errors::{StoreError, StoreResult};
use std::time::Duration;
use tokio::time::timeout;

/// Default timeout for database queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for transactions (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Execute a query with timeout
///
/// # Arguments
///
/// * `duration` - Timeout duration
/// * `future` - Async operation to execute
///
/// # Returns
///
/// * `StoreResult<T>` - Result, classified database error, or timeout error
///
/// # Example
///
/// ```no_run
/// use maskr::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// # use sqlx::PgPool;
/// # async fn example(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
///
/// let result = with_timeout(
///     DEFAULT_QUERY_TIMEOUT,
///     sqlx::query("SELECT domain FROM domains").fetch_all(pool)
/// ).await?;
///
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> StoreResult<T>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(duration, future).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(StoreError::from(e)),
        Err(_) => Err(StoreError::Timeout(duration)),
    }
}

/// Execute a query with default timeout (5 seconds)
pub async fn with_default_timeout<F, T>(future: F) -> StoreResult<T>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}

/// Run a multi-statement transaction under the transaction deadline
///
/// Unlike [`with_timeout`], the body already yields classified store errors. A
/// transaction abandoned by the deadline is rolled back when it is dropped.
pub async fn with_transaction_timeout<F, T>(future: F) -> StoreResult<T>
where
    F: std::future::Future<Output = StoreResult<T>>,
{
    match timeout(DEFAULT_TRANSACTION_TIMEOUT, future).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(DEFAULT_TRANSACTION_TIMEOUT)),
    }
}
