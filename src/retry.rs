//! Retry with exponential backoff for idempotent portal requests

use crate::config::RetryPolicy;
use std::future::Future;
use std::time::Duration;

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    policy
        .backoff
        .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

/// Run `op` until it succeeds or `1 + policy.retries` attempts have failed.
///
/// The last error is returned unchanged.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.retries => {
                attempt += 1;
                let delay = backoff_delay(policy, attempt);
                tracing::debug!(
                    "{} failed ({}), retry {}/{} in {:?}",
                    label,
                    e,
                    attempt,
                    policy.retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
