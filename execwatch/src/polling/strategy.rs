//! Polling interval strategies.
//!
//! Interval selection is a pure function of the observed status and how
//! long the status has stayed the same, so strategies are unit-testable
//! without timers.

use crate::core::ExecutionStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default short interval for active executions.
const DEFAULT_BASE_MS: u64 = 1_000;
/// Default cap for stretched intervals.
const DEFAULT_MAX_MS: u64 = 15_000;
/// Default interval while the remote execution waits on external input.
const DEFAULT_WAIT_MS: u64 = 30_000;

/// How a monitoring session spaces its status checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PollStrategy {
    /// One constant interval, ignoring observed status. Predictable for
    /// tests and latency-insensitive callers.
    Fixed {
        /// The constant interval in milliseconds.
        interval_ms: u64,
    },
    /// Status-driven: short while the execution makes progress, linearly
    /// stretched while the status does not change, long while waiting.
    Adaptive {
        /// Interval after a status change, in milliseconds.
        base_ms: u64,
        /// Cap for stretched intervals, in milliseconds.
        max_ms: u64,
        /// Interval while waiting on external input, in milliseconds.
        wait_ms: u64,
    },
    /// Interval doubles on every tick without a status change, capped.
    Backoff {
        /// Initial interval in milliseconds.
        base_ms: u64,
        /// Cap in milliseconds.
        max_ms: u64,
    },
    /// Status-driven like Adaptive, but idle stretching is exponential.
    Hybrid {
        /// Interval after a status change, in milliseconds.
        base_ms: u64,
        /// Cap for stretched intervals, in milliseconds.
        max_ms: u64,
        /// Interval while waiting on external input, in milliseconds.
        wait_ms: u64,
    },
}

impl Default for PollStrategy {
    fn default() -> Self {
        Self::adaptive()
    }
}

impl PollStrategy {
    /// Creates a fixed strategy.
    #[must_use]
    pub fn fixed(interval: Duration) -> Self {
        Self::Fixed {
            interval_ms: interval.as_millis() as u64,
        }
    }

    /// Creates an adaptive strategy with default intervals.
    #[must_use]
    pub fn adaptive() -> Self {
        Self::Adaptive {
            base_ms: DEFAULT_BASE_MS,
            max_ms: DEFAULT_MAX_MS,
            wait_ms: DEFAULT_WAIT_MS,
        }
    }

    /// Creates a backoff strategy with default intervals.
    #[must_use]
    pub fn backoff() -> Self {
        Self::Backoff {
            base_ms: DEFAULT_BASE_MS,
            max_ms: DEFAULT_MAX_MS,
        }
    }

    /// Creates a hybrid strategy with default intervals.
    #[must_use]
    pub fn hybrid() -> Self {
        Self::Hybrid {
            base_ms: DEFAULT_BASE_MS,
            max_ms: DEFAULT_MAX_MS,
            wait_ms: DEFAULT_WAIT_MS,
        }
    }

    /// The strategy name for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fixed { .. } => "fixed",
            Self::Adaptive { .. } => "adaptive",
            Self::Backoff { .. } => "backoff",
            Self::Hybrid { .. } => "hybrid",
        }
    }

    /// The interval used for the first tick of a session.
    #[must_use]
    pub fn initial_interval(&self) -> Duration {
        let ms = match self {
            Self::Fixed { interval_ms } => *interval_ms,
            Self::Adaptive { base_ms, .. }
            | Self::Backoff { base_ms, .. }
            | Self::Hybrid { base_ms, .. } => *base_ms,
        };
        Duration::from_millis(ms)
    }

    /// Selects the next interval from the observed status and the number
    /// of consecutive ticks the status stayed unchanged.
    ///
    /// `consecutive_identical` is 0 right after a status change.
    #[must_use]
    pub fn next_interval(
        &self,
        observed: ExecutionStatus,
        consecutive_identical: u32,
    ) -> Duration {
        let ms = match self {
            Self::Fixed { interval_ms } => *interval_ms,
            Self::Adaptive {
                base_ms,
                max_ms,
                wait_ms,
            } => match observed {
                ExecutionStatus::Waiting => *wait_ms,
                ExecutionStatus::New => *base_ms,
                _ => base_ms
                    .saturating_mul(u64::from(consecutive_identical) + 1)
                    .min(*max_ms),
            },
            Self::Backoff { base_ms, max_ms } => base_ms
                .saturating_mul(2u64.saturating_pow(consecutive_identical))
                .min(*max_ms),
            Self::Hybrid {
                base_ms,
                max_ms,
                wait_ms,
            } => match observed {
                ExecutionStatus::Waiting => *wait_ms,
                ExecutionStatus::New => *base_ms,
                _ => base_ms
                    .saturating_mul(2u64.saturating_pow(consecutive_identical))
                    .min(*max_ms),
            },
        };
        Duration::from_millis(ms)
    }
}
