//! Observability helpers: span attributes, timers, and tracing setup.

mod tracing;

pub use tracing::{
    init_tracing, CallSpanAttributes, SessionSpanAttributes, SpanTimer,
};
