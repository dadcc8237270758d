//! Adaptive status polling.
//!
//! This module provides:
//! - Interval selection strategies
//! - Pure per-tick session state transitions
//! - The polling engine spawning one task per monitored execution

mod engine;
mod session;
mod strategy;

pub use engine::{ExecutionStream, PollingEngine, SessionInfo};
pub use session::{apply_tick, SessionState, TickOutcome};
pub use strategy::PollStrategy;
