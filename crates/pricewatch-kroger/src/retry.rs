//! Retry with exponential backoff for transient API failures.
//!
//! Both the products path and the token path share this helper; they differ
//! only in their budgets. Non-retriable errors are propagated immediately
//! without sleeping.

use std::future::Future;
use std::time::Duration;

use crate::error::KrogerError;

/// Hard ceiling on a single backoff delay.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Returns `true` if `err` represents a transient condition that should be
/// retried after a backoff delay.
///
/// Retriable:
/// - [`KrogerError::RetryableStatus`]: HTTP 429 or a 5xx; the server may recover.
/// - [`KrogerError::Http`] when it is a timeout, connect failure or other
///   transport-level send failure.
///
/// Non-retriable (propagated immediately):
/// - [`KrogerError::CredentialRejected`]: bad credentials stay bad.
/// - [`KrogerError::Deserialize`]: retrying won't change the body shape.
/// - [`KrogerError::InvalidUrl`]: configuration problem, not a network one.
fn is_retriable(err: &KrogerError) -> bool {
    match err {
        KrogerError::RetryableStatus { .. } => true,
        KrogerError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        KrogerError::CredentialRejected { .. }
        | KrogerError::InvalidUrl(_)
        | KrogerError::Deserialize { .. } => false,
    }
}

/// Executes `operation` with exponential backoff retries on transient errors.
///
/// On success the result is returned immediately. On a retriable error the
/// function sleeps for `backoff_base_ms * 2^attempt` milliseconds (capped at
/// 30 s) and tries again, up to `max_retries` additional attempts after the
/// first try. If all retries are exhausted the last error is returned.
///
/// With `max_retries = 4` and a 1000 ms base the schedule is 1 s, 2 s, 4 s,
/// 8 s between the 5 total attempts.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, KrogerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, KrogerError>>,
{
    let mut last_err;
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                last_err = err;
            }
        }

        // base * 2^attempt, saturating, then capped at MAX_BACKOFF_MS.
        let delay_ms = backoff_base_ms
            .saturating_mul(1u64 << attempt.min(62))
            .min(MAX_BACKOFF_MS);
        tracing::warn!(
            attempt,
            max_retries,
            delay_ms,
            error = %last_err,
            "transient API error, retrying after backoff"
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        attempt += 1;
    }
}
