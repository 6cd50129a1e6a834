//! Fixed-delay retry for remote calls
//!
//! **Algorithm:**
//! 1. Invoke the operation
//! 2. On success, return the value
//! 3. On failure, log it tagged with `label`
//!    a. If attempts remain: sleep `delay` (the same delay every time), retry
//!    b. Otherwise: return the last error
//!
//! The delay does not grow between attempts. Upstream rate limits were tuned
//! against this fixed schedule.

use legis_common::Clock;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Run `operation` up to `max_attempts` times (at least once), sleeping `delay`
/// on `clock` between failed attempts
///
/// # Arguments
/// * `clock` - Source of the inter-attempt sleep
/// * `max_attempts` - Total invocations allowed; `0` is treated as `1`
/// * `delay` - Fixed pause between attempts
/// * `label` - Tag for log lines (e.g., "fetch senators")
/// * `operation` - Async closure performing the remote call
///
/// # Returns
/// The first success, or the error from the final attempt
pub async fn with_retry<F, Fut, T, E>(
    clock: &dyn Clock,
    max_attempts: u32,
    delay: Duration,
    label: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(label, attempt, "Remote call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt >= max_attempts {
                    tracing::error!(
                        label,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Remote call failed, retries exhausted"
                    );
                    return Err(err);
                }

                tracing::warn!(
                    label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Remote call failed, will retry"
                );
                clock.sleep(delay).await;
            }
        }
    }
}
