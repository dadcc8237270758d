//! # Execwatch
//!
//! Client-side resilience and adaptive monitoring for long-lived remote
//! workflow executions.
//!
//! Execwatch wraps an [`gateway::ExecutionGateway`] with:
//!
//! - **Resilient calls**: bounded retry with jittered exponential backoff
//!   and a per-endpoint circuit breaker
//! - **Adaptive polling**: one independent monitoring session per
//!   execution, with status-driven interval selection and duplicate
//!   suppression
//! - **Stream recovery**: a generic combinator applying retry, fallback,
//!   skip, restart or escalate policies to any fallible stream
//! - **Cancellation handling**: idempotent, awaitable per-session tokens
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use execwatch::prelude::*;
//! use futures::StreamExt;
//!
//! let client = WorkflowClient::builder(gateway)
//!     .with_retry(RetryConfig::new().with_max_retries(5))
//!     .build();
//!
//! let execution_id = client.start("trigger-1", payload).await?;
//! let mut updates = client.monitor(&execution_id, PollStrategy::adaptive());
//!
//! while let Some(snapshot) = updates.next().await {
//!     println!("{}", snapshot?.status);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
mod client;
pub mod core;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod observability;
pub mod polling;
pub mod recovery;
pub mod resilience;
pub mod testing;

pub use client::{WorkflowClient, WorkflowClientBuilder};


/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::client::{WorkflowClient, WorkflowClientBuilder};
    pub use crate::core::{ExecutionRecord, ExecutionStatus};
    pub use crate::errors::{
        GatewayError, MonitorError, RecoverableError, ResilienceError,
    };
    pub use crate::events::{
        CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::gateway::ExecutionGateway;
    pub use crate::polling::{ExecutionStream, PollStrategy, PollingEngine, SessionInfo};
    pub use crate::recovery::{
        wrap_stream, RecoveryPolicy, RecoveryStrategy, Restart,
    };
    pub use crate::resilience::{
        CircuitBreakerConfig, CircuitMode, ResilientExecutor, RetryConfig,
    };
}
