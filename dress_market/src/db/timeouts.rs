//! Transaction deadline helpers.
//!
//! Every market operation runs inside one transaction. Wrapping the whole
//! unit of work in [`with_timeout`] means an expired deadline drops the
//! transaction handle, which rolls back every write made so far.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use super::errors::StoreError;

/// Default timeout for a market transaction (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `future` with a deadline.
///
/// The error type only needs to absorb a [`StoreError`], so the same helper
/// serves the ledger, inventory and order managers.
///
/// # Example
///
/// ```no_run
/// use dress_market::db::{StoreError, timeouts::{with_timeout, DEFAULT_TRANSACTION_TIMEOUT}};
/// # async fn example() -> Result<(), StoreError> {
/// let value = with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async { Ok::<_, StoreError>(42) }).await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T, E>(duration: Duration, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<StoreError>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(duration).into()),
    }
}
