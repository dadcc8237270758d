//! Resilient remote-call execution.
//!
//! This module provides:
//! - Retry configuration with exponential backoff and jitter
//! - A per-endpoint circuit breaker registry
//! - The `ResilientExecutor` combining both around any remote call

mod breaker;
mod executor;
mod retry;

pub use breaker::{
    CallDecision, CircuitBreakerConfig, CircuitMode, CircuitRegistry, CircuitSnapshot,
    CircuitTransition,
};
pub use executor::ResilientExecutor;
pub use retry::RetryConfig;
