//! Bounded retry with exponential backoff for backend calls.
//!
//! Only the request/response exchange with the backend is retried. Tool
//! execution never goes through this wrapper.

use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use stepwise_config::RetryConfig;
use stepwise_core::error::ProviderError;
use tracing::{debug, warn};

/// Decides whether a failed attempt may be retried.
pub type RetryPredicate = Arc<dyn Fn(&ProviderError) -> bool + Send + Sync>;

/// A backend call that failed for good.
#[derive(Debug, thiserror::Error)]
#[error("LLM call failed after {attempts} attempt(s): {source}")]
pub struct RetryError {
    /// How many attempts were made, including the first
    pub attempts: u32,

    /// The fault from the last attempt
    pub source: ProviderError,
}

/// Retry configuration and executor.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_fraction: f64,
    retryable: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_fraction: 0.1,
            retryable: Arc::new(ProviderError::is_retryable),
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter_fraction", &self.jitter_fraction)
            .finish_non_exhaustive()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.effective_attempts(),
            base_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            jitter_fraction: config.jitter_fraction,
            ..Self::default()
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Replace the retryable/fatal classification.
    pub fn with_retryable(
        mut self,
        predicate: impl Fn(&ProviderError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.retryable = Arc::new(predicate);
        self
    }

    pub fn is_retryable(&self, error: &ProviderError) -> bool {
        (self.retryable)(error)
    }

    /// Un-jittered delay after the failed attempt with 0-based index `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let secs = self.base_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter_fraction <= 0.0 {
            return delay;
        }
        let j = self.jitter_fraction;
        let factor = 1.0 + rand::rng().random_range(-j..=j);
        Duration::from_secs_f64((delay.as_secs_f64() * factor).max(0.0))
    }

    fn delay_for(&self, attempt: u32, error: &ProviderError) -> Duration {
        let backoff = self.jittered(self.backoff(attempt));
        match error.retry_after() {
            Some(hint) => backoff.max(hint).min(self.max_delay),
            None => backoff,
        }
    }

    /// Run `operation` until it succeeds, fails fatally, or attempts run out.
    pub async fn call<T, F, Fut>(&self, mut operation: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Backend call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !self.is_retryable(&error) {
                warn!(attempt, error = %error, "Backend call failed with a fatal error");
                return Err(RetryError {
                    attempts: attempt,
                    source: error,
                });
            }

            if attempt >= max_attempts {
                warn!(
                    attempts = attempt,
                    error = %error,
                    "Backend call failed, retry attempts exhausted"
                );
                return Err(RetryError {
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = self.delay_for(attempt - 1, &error);
            warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Backend call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
