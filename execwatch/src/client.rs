//! The `WorkflowClient` facade.
//!
//! Bundles the resilient executor, the polling engine and stream
//! recovery behind one entry point. One client owns one circuit
//! registry; every call and every monitoring session made through the
//! client shares it.

use crate::core::ExecutionRecord;
use crate::errors::{GatewayError, MonitorError, ResilienceError};
use crate::events::{event_type, EventSink, NoOpEventSink};
use crate::gateway::{endpoint, ExecutionGateway};
use crate::polling::{ExecutionStream, PollStrategy, PollingEngine, SessionInfo};
use crate::recovery::{wrap_stream, RecoveryPolicy, Restart};
use crate::resilience::{CircuitBreakerConfig, CircuitMode, ResilientExecutor, RetryConfig};
use futures::Stream;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Client for starting, steering and monitoring remote executions.
///
/// Construct with [`WorkflowClient::builder`].
#[derive(Clone)]
pub struct WorkflowClient {
    gateway: Arc<dyn ExecutionGateway>,
    executor: ResilientExecutor,
    engine: PollingEngine,
    events: Arc<dyn EventSink>,
}

impl WorkflowClient {
    /// Starts building a client around a gateway.
    #[must_use]
    pub fn builder(gateway: Arc<dyn ExecutionGateway>) -> WorkflowClientBuilder {
        WorkflowClientBuilder::new(gateway)
    }

    /// Starts an execution through the resilient executor.
    pub async fn start(
        &self,
        trigger_id: &str,
        payload: serde_json::Value,
    ) -> Result<String, ResilienceError> {
        let gateway = self.gateway.clone();
        let trigger_id = trigger_id.to_string();
        self.executor
            .execute(endpoint::START, move || {
                let gateway = gateway.clone();
                let trigger_id = trigger_id.clone();
                let payload = payload.clone();
                async move { gateway.start_execution(&trigger_id, payload).await }
            })
            .await
    }

    /// Resumes a waiting execution with the given input.
    pub async fn resume(
        &self,
        execution_id: &str,
        input: serde_json::Value,
    ) -> Result<(), ResilienceError> {
        let gateway = self.gateway.clone();
        let execution_id = execution_id.to_string();
        self.executor
            .execute(endpoint::RESUME, move || {
                let gateway = gateway.clone();
                let execution_id = execution_id.clone();
                let input = input.clone();
                async move { gateway.resume_execution(&execution_id, input).await }
            })
            .await
    }

    /// Asks the remote system to cancel an execution.
    ///
    /// This cancels the remote job, not any local monitoring session;
    /// a session observing the execution will see a `Canceled` snapshot.
    pub async fn cancel_remote(&self, execution_id: &str) -> Result<(), ResilienceError> {
        let gateway = self.gateway.clone();
        let execution_id = execution_id.to_string();
        self.executor
            .execute(endpoint::CANCEL, move || {
                let gateway = gateway.clone();
                let execution_id = execution_id.clone();
                async move { gateway.cancel_execution(&execution_id).await }
            })
            .await
    }

    /// Monitors an execution until it reaches a terminal status.
    #[must_use]
    pub fn monitor(&self, execution_id: impl Into<String>, strategy: PollStrategy) -> ExecutionStream {
        self.engine.monitor(execution_id, strategy)
    }

    /// Monitors an execution with a recovery policy applied on top.
    ///
    /// Each recovery opens a fresh monitoring session; duplicate
    /// suppression restarts with it, so a snapshot already seen before
    /// the failure may be delivered again.
    #[must_use]
    pub fn monitor_with_recovery(
        &self,
        execution_id: impl Into<String>,
        strategy: PollStrategy,
        policy: RecoveryPolicy<ExecutionRecord>,
    ) -> impl Stream<Item = Result<ExecutionRecord, MonitorError>> {
        let engine = self.engine.clone();
        let events = self.events.clone();
        let execution_id = execution_id.into();
        let mut subscriptions: u32 = 0;
        wrap_stream(
            move |restart: Restart| {
                if subscriptions > 0 {
                    events.try_emit(
                        event_type::STREAM_RECOVERED,
                        Some(serde_json::json!({
                            "execution_id": execution_id,
                            "restart": match restart {
                                Restart::Fresh => "fresh".to_string(),
                                Restart::Resume { delivered } => format!("resume:{delivered}"),
                            },
                        })),
                    );
                }
                subscriptions += 1;
                engine.monitor(execution_id.clone(), strategy.clone())
            },
            policy,
        )
    }

    /// Runs one operation through retry and the shared circuit breaker.
    pub async fn execute_resilient<T, F, Fut>(
        &self,
        endpoint_key: &str,
        operation: F,
    ) -> Result<T, ResilienceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        self.executor.execute(endpoint_key, operation).await
    }

    /// Current circuit mode for an endpoint.
    #[must_use]
    pub fn circuit_mode(&self, endpoint_key: &str) -> CircuitMode {
        self.executor.circuit_mode(endpoint_key)
    }

    /// Current polling interval of a live session, if any.
    #[must_use]
    pub fn current_interval(&self, execution_id: &str) -> Option<Duration> {
        self.engine.current_interval(execution_id)
    }

    /// Snapshots of all live monitoring sessions.
    #[must_use]
    pub fn active_sessions(&self) -> Vec<SessionInfo> {
        self.engine.active_sessions()
    }
}

impl std::fmt::Debug for WorkflowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowClient")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

/// Builder for [`WorkflowClient`].
pub struct WorkflowClientBuilder {
    gateway: Arc<dyn ExecutionGateway>,
    retry: RetryConfig,
    breaker: CircuitBreakerConfig,
    events: Arc<dyn EventSink>,
    max_session_duration: Option<Duration>,
}

impl WorkflowClientBuilder {
    fn new(gateway: Arc<dyn ExecutionGateway>) -> Self {
        Self {
            gateway,
            retry: RetryConfig::default(),
            breaker: CircuitBreakerConfig::default(),
            events: Arc::new(NoOpEventSink),
            max_session_duration: None,
        }
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the circuit breaker configuration.
    #[must_use]
    pub fn with_circuit_breaker(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    /// Sets the event sink shared by the executor and the engine.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Caps every monitoring session's lifetime; expiry surfaces as a
    /// cancellation.
    #[must_use]
    pub fn with_max_session_duration(mut self, duration: Duration) -> Self {
        self.max_session_duration = Some(duration);
        self
    }

    /// Builds the client.
    #[must_use]
    pub fn build(self) -> WorkflowClient {
        let executor = ResilientExecutor::new(self.retry, self.breaker)
            .with_event_sink(self.events.clone());
        let mut engine = PollingEngine::new(self.gateway.clone(), executor.clone())
            .with_event_sink(self.events.clone());
        if let Some(duration) = self.max_session_duration {
            engine = engine.with_max_session_duration(duration);
        }

        WorkflowClient {
            gateway: self.gateway,
            executor,
            engine,
            events: self.events,
        }
    }
}
