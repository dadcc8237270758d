//! Monitor lifecycle events.
//!
//! This module provides:
//! - The `EventSink` trait consumed by the executor and polling engine
//! - No-op, logging, and collecting sink implementations

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Well-known event type names emitted by the runtime.
pub mod event_type {
    /// A remote call attempt is about to be made.
    pub const CALL_ATTEMPT: &str = "call.attempt";
    /// A transient failure scheduled a retry.
    pub const CALL_RETRY: &str = "call.retry";
    /// The retry budget was exhausted.
    pub const CALL_EXHAUSTED: &str = "call.exhausted";
    /// A circuit transitioned to open.
    pub const CIRCUIT_OPENED: &str = "circuit.opened";
    /// A circuit admitted a half-open trial call.
    pub const CIRCUIT_HALF_OPEN: &str = "circuit.half_open";
    /// A circuit closed after a successful trial.
    pub const CIRCUIT_CLOSED: &str = "circuit.closed";
    /// A monitoring session started.
    pub const SESSION_STARTED: &str = "session.started";
    /// A session emitted a fresh snapshot.
    pub const SESSION_SNAPSHOT: &str = "session.snapshot";
    /// A session observed a terminal status and stopped.
    pub const SESSION_TERMINAL: &str = "session.terminal";
    /// A session was cancelled by the caller.
    pub const SESSION_CANCELLED: &str = "session.cancelled";
    /// A session hit its maximum duration safety valve.
    pub const SESSION_EXPIRED: &str = "session.expired";
    /// A session terminated with an error.
    pub const SESSION_ERROR: &str = "session.error";
    /// A wrapped stream recovered from an error.
    pub const STREAM_RECOVERED: &str = "stream.recovered";
}
