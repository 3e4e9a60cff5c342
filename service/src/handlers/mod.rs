//! API handlers.
//!
//! Every operation that touches the store runs on the blocking pool, since lock waits
//! block the calling thread.

pub mod accounts;
pub mod health;
pub mod interest;
pub mod ledger;
pub mod transfers;

use crate::error::ApiError;

/// Run a blocking store operation off the async runtime.
pub(crate) async fn blocking<T, F>(op: F) -> Result<T, ApiError>
where
    F: FnOnce() -> fundsflow_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(op).await??)
}
