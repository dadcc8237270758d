//! Error types for the execwatch runtime.
//!
//! The taxonomy mirrors the remote API's failure modes: transient transport
//! failures that are worth retrying, client-side failures that are not, and
//! synthetic failures raised by the resilience layer itself.

use std::time::Duration;
use thiserror::Error;

/// A failure surfaced by the remote execution gateway.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The request never reached the remote endpoint.
    #[error("Network error: {0}")]
    Network(String),

    /// The call exceeded its per-request timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The remote endpoint answered with a 5xx status.
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response message.
        message: String,
    },

    /// The remote endpoint answered with a 4xx status.
    #[error("Client error ({status}): {message}")]
    Client {
        /// HTTP status code.
        status: u16,
        /// Response message.
        message: String,
    },

    /// Authentication or authorization failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The endpoint rate-limited the call (429).
    #[error("Rate limited: {message}")]
    RateLimit {
        /// Server-advertised wait before retrying, if any.
        retry_after: Option<Duration>,
        /// Response message.
        message: String,
    },

    /// A failure that fits no other category.
    #[error("Unknown gateway error: {0}")]
    Unknown(String),
}

impl GatewayError {
    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Creates a server error.
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Creates a client error.
    #[must_use]
    pub fn client(status: u16, message: impl Into<String>) -> Self {
        Self::Client {
            status,
            message: message.into(),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Creates a rate-limit error without an advertised retry-after.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimit {
            retry_after: None,
            message: message.into(),
        }
    }

    /// Creates a rate-limit error with an advertised retry-after.
    #[must_use]
    pub fn rate_limited_for(retry_after: Duration, message: impl Into<String>) -> Self {
        Self::RateLimit {
            retry_after: Some(retry_after),
            message: message.into(),
        }
    }

    /// Returns true if retrying the call may succeed.
    ///
    /// Network errors, timeouts, 5xx responses and rate limits are
    /// transient. Other 4xx responses and auth failures are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::Server { .. } | Self::RateLimit { .. }
        )
    }

    /// Returns true if this failure counts toward circuit health.
    ///
    /// Validation-class 4xx responses (400, 422) indicate a bad request,
    /// not a troubled endpoint, and leave the circuit untouched.
    #[must_use]
    pub fn affects_circuit(&self) -> bool {
        match self {
            Self::Client { status, .. } => !matches!(*status, 400 | 422),
            _ => true,
        }
    }

    /// Returns the advertised retry-after, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// A failure surfaced by the resilient executor.
#[derive(Debug, Clone, Error)]
pub enum ResilienceError {
    /// The circuit for the endpoint is open; no network attempt was made.
    #[error("Circuit '{endpoint}' is open; retry in {}ms", retry_in.as_millis())]
    CircuitOpen {
        /// The endpoint key whose circuit is open.
        endpoint: String,
        /// Time remaining until the circuit admits a trial call.
        retry_in: Duration,
    },

    /// The retry budget was exhausted without a successful call.
    #[error(
        "Retries exhausted after {attempts} attempts ({}ms of backoff): {source}",
        cumulative_delay.as_millis()
    )]
    RetriesExhausted {
        /// Total attempts made, including the initial call.
        attempts: usize,
        /// Total time spent sleeping between attempts.
        cumulative_delay: Duration,
        /// The last transient error observed.
        source: GatewayError,
    },

    /// A non-retryable gateway failure, surfaced immediately.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ResilienceError {
    /// Returns true if the failure was raised without a network attempt.
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }
}

/// A failure terminating a monitoring session.
#[derive(Debug, Clone, Error)]
pub enum MonitorError {
    /// The underlying status call failed beyond recovery.
    #[error(transparent)]
    Resilience(#[from] ResilienceError),

    /// The session was cancelled before a terminal status was observed.
    #[error("Monitoring session cancelled: {0}")]
    Cancelled(String),
}

/// Classifies errors for skip-and-continue recovery.
///
/// A fatal error means the source cannot produce further elements, so
/// skipping is pointless and the error must propagate.
pub trait RecoverableError {
    /// Returns true if the source is dead after this error.
    fn is_fatal(&self) -> bool {
        false
    }
}

impl RecoverableError for GatewayError {
    fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl RecoverableError for ResilienceError {
    fn is_fatal(&self) -> bool {
        match self {
            Self::CircuitOpen { .. } => true,
            Self::RetriesExhausted { source, .. } | Self::Gateway(source) => source.is_fatal(),
        }
    }
}

impl RecoverableError for MonitorError {
    fn is_fatal(&self) -> bool {
        match self {
            Self::Cancelled(_) => true,
            Self::Resilience(err) => err.is_fatal(),
        }
    }
}
