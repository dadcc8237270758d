//! Per-endpoint circuit breaker state machine.
//!
//! One [`CircuitRegistry`] is owned by each executor and shared by every
//! monitoring session in the process. State is keyed by logical endpoint,
//! not by execution id, so a flapping endpoint trips for all callers at
//! once. Every transition happens under the registry entry's lock.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// The mode of a single endpoint's circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitMode {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls fail fast without a network attempt.
    Open,
    /// Exactly one trial call is admitted at a time.
    HalfOpen,
}

impl fmt::Display for CircuitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before admitting a trial.
    pub cooldown_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 30_000,
        }
    }
}

impl CircuitBreakerConfig {
    /// Creates a new config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the failure threshold.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Sets the cooldown period.
    #[must_use]
    pub fn with_cooldown_ms(mut self, cooldown: u64) -> Self {
        self.cooldown_ms = cooldown;
        self
    }

    fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Mutable per-endpoint circuit state.
#[derive(Debug)]
struct CircuitState {
    mode: CircuitMode,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    opened_until: Option<Instant>,
    /// True while a half-open trial call is in flight.
    trial_in_flight: bool,
}

impl CircuitState {
    fn new() -> Self {
        Self {
            mode: CircuitMode::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            opened_until: None,
            trial_in_flight: false,
        }
    }
}

/// Read-only view of an endpoint's circuit for diagnostics.
#[derive(Debug, Clone)]
pub struct CircuitSnapshot {
    /// The endpoint key.
    pub endpoint: String,
    /// Current mode.
    pub mode: CircuitMode,
    /// Current consecutive failure count.
    pub consecutive_failures: u32,
    /// Time remaining until an open circuit admits a trial, if open.
    pub retry_in: Option<Duration>,
}

/// Decision returned before a call is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDecision {
    /// The circuit is closed; proceed.
    Allow,
    /// The circuit just moved to half-open; this call is the trial.
    AllowTrial,
    /// The circuit is open (or a trial is already in flight); fail fast.
    Reject,
}

/// A state transition worth reporting to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitTransition {
    /// The circuit opened (or re-opened after a failed trial).
    Opened,
    /// The circuit closed after a successful trial.
    Closed,
}

/// Process-wide circuit state, keyed by logical endpoint.
///
/// Created lazily per endpoint on first call; entries are never removed
/// while the registry lives.
#[derive(Debug)]
pub struct CircuitRegistry {
    config: CircuitBreakerConfig,
    states: DashMap<String, CircuitState>,
}

impl CircuitRegistry {
    /// Creates a new registry.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            states: DashMap::new(),
        }
    }

    /// Decides whether a call to the endpoint may be attempted.
    ///
    /// Transitions Open to HalfOpen once the cooldown has elapsed and
    /// reserves the single trial slot for the caller that got there first.
    pub fn begin_call(&self, endpoint: &str) -> CallDecision {
        let mut state = self
            .states
            .entry(endpoint.to_string())
            .or_insert_with(CircuitState::new);

        match state.mode {
            CircuitMode::Closed => CallDecision::Allow,
            CircuitMode::Open => {
                let elapsed = state
                    .opened_until
                    .map_or(true, |until| Instant::now() >= until);
                if elapsed {
                    state.mode = CircuitMode::HalfOpen;
                    state.trial_in_flight = true;
                    CallDecision::AllowTrial
                } else {
                    CallDecision::Reject
                }
            }
            CircuitMode::HalfOpen => {
                if state.trial_in_flight {
                    CallDecision::Reject
                } else {
                    state.trial_in_flight = true;
                    CallDecision::AllowTrial
                }
            }
        }
    }

    /// Records a successful call.
    ///
    /// Resets the failure count; a successful half-open trial closes the
    /// circuit.
    pub fn record_success(&self, endpoint: &str) -> Option<CircuitTransition> {
        let mut state = self
            .states
            .entry(endpoint.to_string())
            .or_insert_with(CircuitState::new);

        let was_half_open = state.mode == CircuitMode::HalfOpen;
        state.mode = CircuitMode::Closed;
        state.consecutive_failures = 0;
        state.opened_until = None;
        state.trial_in_flight = false;

        was_half_open.then_some(CircuitTransition::Closed)
    }

    /// Records a failure that counts toward circuit health.
    ///
    /// A failed half-open trial re-opens with a fresh cooldown; a closed
    /// circuit opens once the threshold is reached.
    pub fn record_failure(&self, endpoint: &str) -> Option<CircuitTransition> {
        let mut state = self
            .states
            .entry(endpoint.to_string())
            .or_insert_with(CircuitState::new);

        let now = Instant::now();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_failure_at = Some(now);

        let should_open = match state.mode {
            CircuitMode::HalfOpen => true,
            CircuitMode::Closed => state.consecutive_failures >= self.config.failure_threshold,
            CircuitMode::Open => false,
        };

        state.trial_in_flight = false;

        if should_open {
            state.mode = CircuitMode::Open;
            state.opened_until = Some(now + self.config.cooldown());
            Some(CircuitTransition::Opened)
        } else {
            None
        }
    }

    /// Records a call outcome that must not affect circuit health.
    ///
    /// Releases the half-open trial slot so a later call can re-probe.
    pub fn record_neutral(&self, endpoint: &str) {
        if let Some(mut state) = self.states.get_mut(endpoint) {
            state.trial_in_flight = false;
        }
    }

    /// Returns the current mode for an endpoint.
    ///
    /// Endpoints that were never called report Closed.
    #[must_use]
    pub fn mode(&self, endpoint: &str) -> CircuitMode {
        self.states
            .get(endpoint)
            .map_or(CircuitMode::Closed, |state| state.mode)
    }

    /// Returns a diagnostic snapshot for an endpoint, if it exists.
    #[must_use]
    pub fn snapshot(&self, endpoint: &str) -> Option<CircuitSnapshot> {
        self.states.get(endpoint).map(|state| CircuitSnapshot {
            endpoint: endpoint.to_string(),
            mode: state.mode,
            consecutive_failures: state.consecutive_failures,
            retry_in: state
                .opened_until
                .map(|until| until.saturating_duration_since(Instant::now())),
        })
    }

    /// Time remaining until an open endpoint admits a trial.
    #[must_use]
    pub fn retry_in(&self, endpoint: &str) -> Duration {
        self.states
            .get(endpoint)
            .and_then(|state| state.opened_until)
            .map_or(Duration::ZERO, |until| {
                until.saturating_duration_since(Instant::now())
            })
    }
}

impl Default for CircuitRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
