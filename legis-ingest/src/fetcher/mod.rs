//! Rate-limited remote fetching
//!
//! - [`retry::with_retry`]: bounded, fixed-delay retry around one remote call
//! - [`Fetcher`]: retry bounds and request pacing from configuration, on an injected clock
//! - [`upstream`]: HTTP client for the upstream API and response-shape decoding

pub mod retry;
pub mod upstream;

pub use retry::with_retry;
pub use upstream::{decode_payload, FetchError, RecordSource, UpstreamClient, UpstreamPayload};

use legis_common::config::{IngestConfig, PacingConfig, RetryConfig};
use legis_common::Clock;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Retry and pacing policy for loops that issue many sequential remote calls
///
/// Callers run each call through [`retry`](Self::retry) and then call
/// [`pause_between_requests`](Self::pause_between_requests) after every success.
/// The pacing pause is independent of the retry delay.
#[derive(Clone)]
pub struct Fetcher {
    clock: Arc<dyn Clock>,
    retry: RetryConfig,
    pacing: PacingConfig,
}

impl Fetcher {
    pub fn new(clock: Arc<dyn Clock>, retry: RetryConfig, pacing: PacingConfig) -> Self {
        Self {
            clock,
            retry,
            pacing,
        }
    }

    pub fn from_config(clock: Arc<dyn Clock>, config: &IngestConfig) -> Self {
        Self::new(clock, config.retry.clone(), config.pacing.clone())
    }

    /// Retry with explicit bounds
    pub async fn with_retry<F, Fut, T, E>(
        &self,
        max_attempts: u32,
        delay: Duration,
        label: &str,
        operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        with_retry(self.clock.as_ref(), max_attempts, delay, label, operation).await
    }

    /// Retry with the configured bounds
    pub async fn retry<F, Fut, T, E>(&self, label: &str, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.with_retry(self.retry.max_attempts, self.retry.delay(), label, operation)
            .await
    }

    /// Pacing pause to insert after each successful call
    pub async fn pause_between_requests(&self) {
        let pause = self.pacing.pause_between_requests();
        if pause.is_zero() {
            return;
        }
        tracing::debug!(pause_ms = pause.as_millis() as u64, "Pacing upstream requests");
        self.clock.sleep(pause).await;
    }

    /// Total invocations allowed by [`retry`](Self::retry)
    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts.max(1)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("retry", &self.retry)
            .field("pacing", &self.pacing)
            .finish()
    }
}
