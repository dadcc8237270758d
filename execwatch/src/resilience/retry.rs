//! Retry configuration with exponential backoff and jitter.

use crate::errors::GatewayError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for retry behavior around a single remote call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retries after the initial attempt.
    pub max_retries: usize,
    /// Base delay between retries in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Uniform jitter ratio applied to each delay, in `[0.0, 1.0]`.
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter_ratio: 0.2,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the jitter ratio.
    #[must_use]
    pub fn with_jitter_ratio(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Calculates the delay for a 0-indexed retry attempt.
    ///
    /// The raw delay is `min(max_delay, base_delay * 2^attempt)`, then
    /// perturbed by a uniform factor in `[1 - jitter, 1 + jitter]` and
    /// clamped to `[0, max_delay]`.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let raw = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_delay_ms);

        if self.jitter_ratio <= f64::EPSILON || raw == 0 {
            return Duration::from_millis(raw);
        }

        let factor = rand::thread_rng()
            .gen_range((1.0 - self.jitter_ratio)..=(1.0 + self.jitter_ratio));
        let jittered = (raw as f64 * factor).max(0.0) as u64;
        Duration::from_millis(jittered.min(self.max_delay_ms))
    }

    /// Calculates the delay for a retry after a specific failure.
    ///
    /// A rate-limit response advertising retry-after overrides the
    /// computed backoff for that attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &GatewayError) -> Duration {
        error
            .retry_after()
            .unwrap_or_else(|| self.backoff_delay(attempt))
    }
}
