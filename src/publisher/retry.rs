//! Retry logic with exponential backoff for idempotent calls.

use crate::config::RetryConfig;
use std::future::Future;
use std::time::Duration;

/// Retry an async operation while it fails transiently
///
/// - Transient errors: back off `base, 2*base, 4*base, ...`, capped at `max_delay_ms`
/// - Anything else, or an exhausted budget: return the error immediately
///
/// `on_retry(attempt, wait, error)` is called before each wait; `attempt`
/// counts from 1.
pub(crate) async fn retry_with_backoff<T, E, F, Fut, C, R>(
    mut operation: F,
    max_retries: u32,
    config: &RetryConfig,
    is_transient: C,
    mut on_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    R: FnMut(u32, Duration, &E),
{
    let mut attempts = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempts > 0 {
                    log::info!("Succeeded after {} retry(ies)", attempts);
                }
                return Ok(result);
            }
            Err(error) => {
                if !is_transient(&error) || attempts >= max_retries {
                    return Err(error);
                }

                attempts += 1;
                let wait = backoff_delay(config, attempts);
                on_retry(attempts, wait, &error);
                tokio::time::sleep(wait).await;
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based)
pub(crate) fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(
        config
            .base_delay_ms
            .saturating_mul(factor)
            .min(config.max_delay_ms),
    )
}
