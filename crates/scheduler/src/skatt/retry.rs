//! Exponential backoff for transient ledger failures.

use std::future::Future;
use std::time::Duration;

use regnskap_core::krav::SkattError;
use regnskap_shared::config::SkattConfig;
use tracing::warn;

/// Retry policy: `max_retries` further attempts after the first, waiting
/// `initial * 2^n` capped at `max` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    max_retries: u32,
}

impl Backoff {
    /// Creates a policy.
    #[must_use]
    pub const fn new(initial: Duration, max: Duration, max_retries: u32) -> Self {
        Self {
            initial,
            max,
            max_retries,
        }
    }

    /// Reads the policy from the client configuration.
    #[must_use]
    pub const fn from_config(config: &SkattConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
            config.max_retries,
        )
    }

    /// Wait before retry number `retry` (zero-based).
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        self.initial
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max)
    }

    /// Runs `op` until it succeeds, fails permanently, or retries run out.
    pub async fn retry<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, SkattError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SkattError>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Err(e) if e.is_transient() && retry < self.max_retries => {
                    let delay = self.delay(retry);
                    warn!(
                        operation,
                        attempt = retry + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Transient Skatt failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                result => return result,
            }
        }
    }
}
