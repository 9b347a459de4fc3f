//! Opt-in retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::scrapers::ScrapeError;

/// Most attempts made for one operation, however the time budget is set.
pub const MAX_ATTEMPTS: u32 = 1_000;

/// Retry policy for document fetches. Disabled while `max_elapsed_secs` is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Give up once this many seconds have been spent waiting.
    #[serde(default)]
    pub max_elapsed_secs: u64,
    /// Longest single wait.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: f64,
    #[serde(default = "default_base")]
    pub base: f64,
}

fn default_max_wait_secs() -> f64 {
    150.0
}

fn default_base() -> f64 {
    1.25
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_elapsed_secs: 0,
            max_wait_secs: default_max_wait_secs(),
            base: default_base(),
        }
    }
}

impl RetryConfig {
    pub fn enabled(&self) -> bool {
        self.max_elapsed_secs > 0
    }

    /// Check that waits grow and are bounded. Only an enabled policy is
    /// checked.
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled() {
            return Ok(());
        }
        if !(self.base.is_finite() && self.base > 1.0) {
            return Err(format!("retry.base must be greater than 1, got {}", self.base));
        }
        if !(self.max_wait_secs.is_finite() && self.max_wait_secs > 0.0) {
            return Err(format!(
                "retry.max_wait_secs must be positive, got {}",
                self.max_wait_secs
            ));
        }
        Ok(())
    }

    fn max_wait(&self) -> f64 {
        if self.max_wait_secs.is_finite() {
            self.max_wait_secs.max(0.0)
        } else {
            0.0
        }
    }

    /// Wait before retry number `attempt` (starting at 1): half of
    /// `base^attempt` plus up to as much again in jitter, capped at
    /// `max_wait_secs`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let cap = self.max_wait();
        let half = self.base.powi(attempt.min(MAX_ATTEMPTS) as i32) / 2.0;
        let half = if half.is_nan() { 0.0 } else { half.clamp(0.0, cap) };
        let jitter = rand::rng().random_range(0.0..=half);
        Duration::from_secs_f64((half + jitter).min(cap))
    }
}

/// Run `op`, retrying retryable errors until the policy's time budget is
/// spent or [`MAX_ATTEMPTS`] calls have been made. Other errors, and every
/// error while retry is disabled, are returned at once.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, ScrapeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScrapeError>>,
{
    let budget = Duration::from_secs(config.max_elapsed_secs);
    let mut waited = Duration::ZERO;
    let mut attempt = 0;

    loop {
        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !config.enabled() || !error.is_retryable() {
            return Err(error);
        }

        attempt += 1;
        if attempt >= MAX_ATTEMPTS {
            return Err(error);
        }
        let wait = config.backoff(attempt);
        if waited + wait > budget {
            return Err(error);
        }

        warn!(
            "Attempt {} failed ({}), retrying in {:.1}s",
            attempt,
            error,
            wait.as_secs_f64()
        );
        tokio::time::sleep(wait).await;
        waited += wait;
    }
}
