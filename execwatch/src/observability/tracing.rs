//! Tracing integration for the monitoring runtime.
//!
//! Span attribute structs flatten into OpenTelemetry-style key maps so
//! callers can forward them to whatever telemetry pipeline they run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Span attributes for one resilient remote call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallSpanAttributes {
    /// Logical endpoint key.
    pub endpoint: String,
    /// 0-indexed attempt number.
    pub attempt: Option<u32>,
    /// Call outcome ("ok", "retry", "circuit_open", ...).
    pub outcome: Option<String>,
    /// Duration in milliseconds.
    pub duration_ms: Option<f64>,
    /// Circuit mode at call time.
    pub circuit_mode: Option<String>,
    /// Error message if failed.
    pub error: Option<String>,
}

impl CallSpanAttributes {
    /// Creates attributes for an endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Sets the attempt number.
    #[must_use]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Sets the outcome.
    #[must_use]
    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the error message.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Converts to OpenTelemetry attributes.
    #[must_use]
    pub fn to_otel_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();

        attrs.insert("call.endpoint".to_string(), self.endpoint.clone());

        if let Some(v) = self.attempt {
            attrs.insert("call.attempt".to_string(), v.to_string());
        }
        if let Some(ref v) = self.outcome {
            attrs.insert("call.outcome".to_string(), v.clone());
        }
        if let Some(v) = self.duration_ms {
            attrs.insert("call.duration_ms".to_string(), v.to_string());
        }
        if let Some(ref v) = self.circuit_mode {
            attrs.insert("call.circuit_mode".to_string(), v.clone());
        }
        if let Some(ref v) = self.error {
            attrs.insert("call.error".to_string(), v.clone());
        }

        attrs
    }
}

/// Span attributes for one monitoring session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSpanAttributes {
    /// Remote execution id.
    pub execution_id: String,
    /// Local session id.
    pub session_id: Option<String>,
    /// Polling strategy name.
    pub strategy: Option<String>,
    /// Current interval in milliseconds.
    pub interval_ms: Option<u64>,
    /// Last observed status.
    pub status: Option<String>,
}

impl SessionSpanAttributes {
    /// Creates attributes for an execution.
    #[must_use]
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            ..Default::default()
        }
    }

    /// Sets the session id.
    #[must_use]
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Sets the strategy name.
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    /// Sets the current interval.
    #[must_use]
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = Some(interval_ms);
        self
    }

    /// Sets the last observed status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Converts to OpenTelemetry attributes.
    #[must_use]
    pub fn to_otel_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();

        attrs.insert("session.execution_id".to_string(), self.execution_id.clone());

        if let Some(ref v) = self.session_id {
            attrs.insert("session.id".to_string(), v.clone());
        }
        if let Some(ref v) = self.strategy {
            attrs.insert("session.strategy".to_string(), v.clone());
        }
        if let Some(v) = self.interval_ms {
            attrs.insert("session.interval_ms".to_string(), v.to_string());
        }
        if let Some(ref v) = self.status {
            attrs.insert("session.status".to_string(), v.clone());
        }

        attrs
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

/// Initializes a tracing subscriber with env-filter support.
///
/// Intended for binaries and integration tests; library code only emits.
/// Safe to call more than once - later calls are ignored.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
