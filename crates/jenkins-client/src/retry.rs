//! Retry policy for idempotent requests.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Retries for GET and HEAD after a transient transport failure.
pub(crate) const IDEMPOTENT_RETRIES: u32 = 1;

pub(crate) const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Run `f`, retrying up to `max_retries` times while the error is retryable.
///
/// The backoff doubles after each attempt and is cut short by `cancel`.
pub(crate) async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    cancel: &CancellationToken,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        match f().await {
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    attempt,
                    max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Request failed, retrying"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff *= 2;
            }
            other => return other,
        }
    }
}
