//! Exponential backoff around whole extraction attempts

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::ExtractError;
use crate::RetryConfig;
use crate::surface::SurfaceResult;

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.base_delay();
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(config.max_delay())
}

/// Run `operation` until it succeeds, fails non-transiently, or the attempts
/// run out.
///
/// Only [`crate::surface::SurfaceError::Transient`] failures are retried. The
/// closure receives the 1-based attempt number.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, ExtractError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = SurfaceResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e.into()),
            Err(e) if attempt >= max_attempts => {
                return Err(ExtractError::RetriesExhausted {
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                let delay = backoff_delay(config, attempt);
                warn!(
                    "Attempt {}/{} failed: {}. Retrying in {}ms",
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
