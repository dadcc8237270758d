//! Recovery policy configuration.

use rand::Rng;
use std::time::Duration;

/// How a recovering stream re-invokes its source factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restart {
    /// Start over; any previously delivered items are forgotten.
    Fresh,
    /// Resume after the given number of already-delivered items.
    Resume {
        /// Items the caller has already received.
        delivered: usize,
    },
}

/// What to do when the wrapped stream yields an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryStrategy<T> {
    /// Re-subscribe and resume after backoff, up to the retry budget.
    Retry,
    /// Emit the given value once and complete the stream normally.
    Fallback(T),
    /// Log the error and keep consuming, unless the error is fatal.
    SkipAndContinue,
    /// Rebuild the source from scratch after backoff, up to the budget.
    RestartFromSource,
    /// Propagate the first error unchanged.
    Escalate,
}

impl<T> Default for RecoveryStrategy<T> {
    fn default() -> Self {
        Self::Escalate
    }
}

impl<T> RecoveryStrategy<T> {
    /// The strategy name for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::Fallback(_) => "fallback",
            Self::SkipAndContinue => "skip_and_continue",
            Self::RestartFromSource => "restart_from_source",
            Self::Escalate => "escalate",
        }
    }
}

/// Immutable recovery configuration for one wrapped stream.
///
/// The backoff schedule mirrors the resilient executor's: exponential
/// doubling from `base_delay_ms`, capped at `max_delay_ms`, perturbed by
/// uniform jitter. It is independent of any circuit breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryPolicy<T> {
    /// Recovery attempts allowed over the stream's lifetime.
    pub max_retries: usize,
    /// Initial backoff delay in milliseconds.
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds.
    pub max_delay_ms: u64,
    /// Uniform jitter ratio in `0.0..=1.0`.
    pub jitter_ratio: f64,
    /// What to do on error.
    pub strategy: RecoveryStrategy<T>,
}

impl<T> Default for RecoveryPolicy<T> {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter_ratio: 0.2,
            strategy: RecoveryStrategy::default(),
        }
    }
}

impl<T> RecoveryPolicy<T> {
    /// Escalate-on-error policy; the safe default.
    #[must_use]
    pub fn escalate() -> Self {
        Self::default()
    }

    /// Re-subscribe on error, resuming where the stream left off.
    #[must_use]
    pub fn retry() -> Self {
        Self {
            strategy: RecoveryStrategy::Retry,
            ..Self::default()
        }
    }

    /// Emit `value` once and complete on the first error.
    #[must_use]
    pub fn fallback(value: T) -> Self {
        Self {
            strategy: RecoveryStrategy::Fallback(value),
            ..Self::default()
        }
    }

    /// Log non-fatal errors and keep consuming the stream.
    #[must_use]
    pub fn skip_and_continue() -> Self {
        Self {
            strategy: RecoveryStrategy::SkipAndContinue,
            ..Self::default()
        }
    }

    /// Rebuild the source from scratch on error.
    #[must_use]
    pub fn restart_from_source() -> Self {
        Self {
            strategy: RecoveryStrategy::RestartFromSource,
            ..Self::default()
        }
    }

    /// Sets the recovery budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the initial backoff delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Sets the backoff cap.
    #[must_use]
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Sets the jitter ratio, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn with_jitter_ratio(mut self, jitter_ratio: f64) -> Self {
        self.jitter_ratio = jitter_ratio.clamp(0.0, 1.0);
        self
    }

    /// Backoff delay before recovery attempt `attempt` (0-indexed).
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_delay_ms);

        if self.jitter_ratio <= 0.0 {
            return Duration::from_millis(exponential);
        }

        let factor = rand::thread_rng()
            .gen_range((1.0 - self.jitter_ratio)..=(1.0 + self.jitter_ratio));
        let jittered = (exponential as f64 * factor).max(0.0) as u64;
        Duration::from_millis(jittered.min(self.max_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_escalate() {
        let policy: RecoveryPolicy<u32> = RecoveryPolicy::default();
        assert_eq!(policy.strategy, RecoveryStrategy::Escalate);
        assert_eq!(policy.max_retries, 3);
    }

    #[test]
    fn test_fallback_carries_value() {
        let policy = RecoveryPolicy::fallback("stale");
        assert_eq!(policy.strategy, RecoveryStrategy::Fallback("stale"));
        assert_eq!(policy.strategy.name(), "fallback");
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy: RecoveryPolicy<u32> = RecoveryPolicy::retry()
            .with_base_delay_ms(100)
            .with_max_delay_ms(350)
            .with_jitter_ratio(0.0);

        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(350));
        assert_eq!(policy.backoff_delay(10), Duration::from_millis(350));
    }

    #[test]
    fn test_jittered_delay_stays_bounded() {
        let policy: RecoveryPolicy<u32> = RecoveryPolicy::retry()
            .with_base_delay_ms(1000)
            .with_max_delay_ms(4000)
            .with_jitter_ratio(0.5);

        for attempt in 0..6 {
            let delay = policy.backoff_delay(attempt);
            assert!(delay <= Duration::from_millis(4000));
        }
    }

    #[test]
    fn test_jitter_ratio_clamped() {
        let policy: RecoveryPolicy<u32> = RecoveryPolicy::retry().with_jitter_ratio(3.0);
        assert!((policy.jitter_ratio - 1.0).abs() < f64::EPSILON);
    }
}
