//! The resilient executor: retry plus circuit breaker around one call.

use super::{CallDecision, CircuitBreakerConfig, CircuitMode, CircuitRegistry, CircuitTransition, RetryConfig};
use crate::errors::{GatewayError, ResilienceError};
use crate::events::{event_type, EventSink, NoOpEventSink};
use crate::observability::SpanTimer;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Wraps any single remote call with bounded retry, exponential backoff
/// with jitter, and a shared per-endpoint circuit breaker.
///
/// One executor (and therefore one circuit registry) is shared by every
/// monitoring session of a client; cloning is cheap.
#[derive(Clone)]
pub struct ResilientExecutor {
    retry: RetryConfig,
    circuits: Arc<CircuitRegistry>,
    events: Arc<dyn EventSink>,
}

impl ResilientExecutor {
    /// Creates a new executor with the given retry and breaker configs.
    #[must_use]
    pub fn new(retry: RetryConfig, breaker: CircuitBreakerConfig) -> Self {
        Self {
            retry,
            circuits: Arc::new(CircuitRegistry::new(breaker)),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the retry configuration.
    #[must_use]
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Current circuit mode for an endpoint (diagnostics only).
    #[must_use]
    pub fn circuit_mode(&self, endpoint: &str) -> CircuitMode {
        self.circuits.mode(endpoint)
    }

    /// The shared circuit registry.
    #[must_use]
    pub fn circuits(&self) -> &Arc<CircuitRegistry> {
        &self.circuits
    }

    /// Executes one remote operation with retry and circuit breaking.
    ///
    /// Transient failures (network, timeout, 5xx, rate-limit) are retried
    /// up to the configured budget with jittered exponential backoff.
    /// Non-retryable failures surface immediately. An open circuit fails
    /// fast with [`ResilienceError::CircuitOpen`] and no network attempt.
    pub async fn execute<T, F, Fut>(
        &self,
        endpoint: &str,
        mut operation: F,
    ) -> Result<T, ResilienceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let mut attempts: usize = 0;
        let mut cumulative_delay = Duration::ZERO;

        loop {
            match self.circuits.begin_call(endpoint) {
                CallDecision::Reject => {
                    let retry_in = self.circuits.retry_in(endpoint);
                    return Err(ResilienceError::CircuitOpen {
                        endpoint: endpoint.to_string(),
                        retry_in,
                    });
                }
                CallDecision::AllowTrial => {
                    self.events.try_emit(
                        event_type::CIRCUIT_HALF_OPEN,
                        Some(serde_json::json!({ "endpoint": endpoint })),
                    );
                }
                CallDecision::Allow => {}
            }

            self.events.try_emit(
                event_type::CALL_ATTEMPT,
                Some(serde_json::json!({ "endpoint": endpoint, "attempt": attempts })),
            );

            let timer = SpanTimer::start(endpoint);
            let result = operation().await;
            attempts += 1;

            match result {
                Ok(value) => {
                    if self.circuits.record_success(endpoint)
                        == Some(CircuitTransition::Closed)
                    {
                        self.events.try_emit(
                            event_type::CIRCUIT_CLOSED,
                            Some(serde_json::json!({ "endpoint": endpoint })),
                        );
                    }
                    debug!(
                        endpoint,
                        attempt = attempts,
                        duration_ms = timer.elapsed_ms(),
                        "Remote call succeeded"
                    );
                    return Ok(value);
                }
                Err(error) => {
                    if error.affects_circuit() {
                        if self.circuits.record_failure(endpoint)
                            == Some(CircuitTransition::Opened)
                        {
                            warn!(endpoint, %error, "Circuit opened");
                            self.events.try_emit(
                                event_type::CIRCUIT_OPENED,
                                Some(serde_json::json!({
                                    "endpoint": endpoint,
                                    "error": error.to_string(),
                                })),
                            );
                        }
                    } else {
                        self.circuits.record_neutral(endpoint);
                    }

                    if !error.is_transient() {
                        return Err(ResilienceError::Gateway(error));
                    }

                    if attempts > self.retry.max_retries {
                        self.events.try_emit(
                            event_type::CALL_EXHAUSTED,
                            Some(serde_json::json!({
                                "endpoint": endpoint,
                                "attempts": attempts,
                            })),
                        );
                        return Err(ResilienceError::RetriesExhausted {
                            attempts,
                            cumulative_delay,
                            source: error,
                        });
                    }

                    let delay = self.retry.delay_for((attempts - 1) as u32, &error);
                    cumulative_delay += delay;
                    debug!(
                        endpoint,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "Retrying after transient failure"
                    );
                    self.events.try_emit(
                        event_type::CALL_RETRY,
                        Some(serde_json::json!({
                            "endpoint": endpoint,
                            "attempt": attempts,
                            "delay_ms": delay.as_millis() as u64,
                        })),
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl std::fmt::Debug for ResilientExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientExecutor")
            .field("retry", &self.retry)
            .field("circuits", &self.circuits)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use parking_lot::Mutex;

    fn executor(max_retries: usize, threshold: u32, cooldown_ms: u64) -> ResilientExecutor {
        ResilientExecutor::new(
            RetryConfig::new()
                .with_max_retries(max_retries)
                .with_base_delay_ms(1)
                .with_jitter_ratio(0.0),
            CircuitBreakerConfig::new()
                .with_failure_threshold(threshold)
                .with_cooldown_ms(cooldown_ms),
        )
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let executor = executor(3, 5, 1000);

        let result: Result<i32, _> = executor
            .execute("get-status", || async { Ok(42) })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(executor.circuit_mode("get-status"), CircuitMode::Closed);
    }

    #[tokio::test]
    async fn test_timeouts_then_success_keeps_circuit_closed() {
        // 3 timeouts then success, threshold 5, retries 5
        let executor = executor(5, 5, 1000);
        let calls = Mutex::new(0u32);

        let result: Result<&str, _> = executor
            .execute("get-status", || {
                let n = {
                    let mut guard = calls.lock();
                    *guard += 1;
                    *guard
                };
                async move {
                    if n <= 3 {
                        Err(GatewayError::timeout("tick"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(*calls.lock(), 4);
        assert_eq!(executor.circuit_mode("get-status"), CircuitMode::Closed);
        let snapshot = executor.circuits().snapshot("get-status").unwrap();
        assert_eq!(snapshot.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_continuous_server_errors_trip_circuit() {
        // Continuous 5xx with threshold 3
        let executor = executor(1, 3, 60_000);
        let calls = Mutex::new(0u32);

        let result: Result<(), _> = executor
            .execute("get-status", || {
                *calls.lock() += 1;
                async { Err(GatewayError::server(500, "boom")) }
            })
            .await;

        assert!(matches!(
            result,
            Err(ResilienceError::RetriesExhausted { attempts: 2, .. })
        ));
        // Third call comes from a second invocation and trips the breaker
        let result: Result<(), _> = executor
            .execute("get-status", || {
                *calls.lock() += 1;
                async { Err(GatewayError::server(500, "boom")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(executor.circuit_mode("get-status"), CircuitMode::Open);

        // Fail fast: no further network attempts while open
        let before = *calls.lock();
        let result: Result<(), _> = executor
            .execute("get-status", || {
                *calls.lock() += 1;
                async { Ok(()) }
            })
            .await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));
        assert_eq!(*calls.lock(), before);
    }

    #[tokio::test]
    async fn test_client_error_not_retried_but_counted() {
        let executor = executor(5, 2, 60_000);
        let calls = Mutex::new(0u32);

        let result: Result<(), _> = executor
            .execute("resume-execution", || {
                *calls.lock() += 1;
                async { Err(GatewayError::client(404, "no such execution")) }
            })
            .await;

        assert!(matches!(result, Err(ResilienceError::Gateway(_))));
        assert_eq!(*calls.lock(), 1);
        let snapshot = executor.circuits().snapshot("resume-execution").unwrap();
        assert_eq!(snapshot.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_validation_error_spares_circuit() {
        let executor = executor(5, 2, 60_000);

        let result: Result<(), _> = executor
            .execute("start-execution", || async {
                Err(GatewayError::client(422, "missing field"))
            })
            .await;

        assert!(matches!(result, Err(ResilienceError::Gateway(_))));
        let snapshot = executor.circuits().snapshot("start-execution").unwrap();
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.mode, CircuitMode::Closed);
    }

    #[tokio::test]
    async fn test_retries_exhausted_metadata() {
        let executor = executor(2, 50, 1000);
        let calls = Mutex::new(0u32);

        let result: Result<(), _> = executor
            .execute("get-status", || {
                *calls.lock() += 1;
                async { Err(GatewayError::network("refused")) }
            })
            .await;

        // Initial attempt plus two retries
        assert_eq!(*calls.lock(), 3);
        match result {
            Err(ResilienceError::RetriesExhausted {
                attempts,
                cumulative_delay,
                source,
            }) => {
                assert_eq!(attempts, 3);
                assert!(cumulative_delay >= Duration::from_millis(2));
                assert!(matches!(source, GatewayError::Network(_)));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_half_open_trial_recovers() {
        let executor = executor(0, 1, 0);

        // Trip the circuit
        let _: Result<(), _> = executor
            .execute("get-status", || async {
                Err(GatewayError::server(503, "down"))
            })
            .await;
        assert_eq!(executor.circuit_mode("get-status"), CircuitMode::Open);

        // Cooldown is zero, so the next call is the half-open trial
        let result: Result<i32, _> = executor
            .execute("get-status", || async { Ok(7) })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(executor.circuit_mode("get-status"), CircuitMode::Closed);
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let sink = Arc::new(CollectingEventSink::new());
        let executor = executor(1, 1, 60_000).with_event_sink(sink.clone());

        let _: Result<(), _> = executor
            .execute("get-status", || async {
                Err(GatewayError::timeout("tick"))
            })
            .await;

        assert!(!sink.events_of_type("call.attempt").is_empty());
        assert!(!sink.events_of_type("circuit.opened").is_empty());
        assert!(!sink.events_of_type("call.exhausted").is_empty());
    }
}
