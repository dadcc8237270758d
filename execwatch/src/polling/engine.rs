//! The polling engine: one independently scheduled task per execution.

use super::{apply_tick, PollStrategy, SessionState, TickOutcome};
use crate::cancellation::CancellationToken;
use crate::core::{ExecutionRecord, ExecutionStatus};
use crate::errors::MonitorError;
use crate::events::{event_type, EventSink, NoOpEventSink};
use crate::gateway::{endpoint, ExecutionGateway};
use crate::resilience::ResilientExecutor;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Capacity of the per-session snapshot channel. Emissions are rare
/// (duplicates are suppressed), so a small buffer suffices.
const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;

/// Diagnostic view of a live monitoring session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Local session id.
    pub session_id: Uuid,
    /// Remote execution id.
    pub execution_id: String,
    /// Strategy name.
    pub strategy: &'static str,
    /// Interval chosen by the most recent tick.
    pub current_interval: Duration,
    /// Last observed status, if any tick completed.
    pub last_status: Option<ExecutionStatus>,
    /// When monitoring started.
    pub started_at: DateTime<Utc>,
}

/// Supervises one monitoring session per execution id.
///
/// Every session runs on its own tokio task with its own timer, so a slow
/// or stuck session never delays the others. Sessions share nothing but
/// the executor's circuit registry.
#[derive(Clone)]
pub struct PollingEngine {
    gateway: Arc<dyn ExecutionGateway>,
    executor: ResilientExecutor,
    events: Arc<dyn EventSink>,
    sessions: Arc<DashMap<String, SessionInfo>>,
    max_session_duration: Option<Duration>,
}

impl PollingEngine {
    /// Creates a new engine.
    #[must_use]
    pub fn new(gateway: Arc<dyn ExecutionGateway>, executor: ResilientExecutor) -> Self {
        Self {
            gateway,
            executor,
            events: Arc::new(NoOpEventSink),
            sessions: Arc::new(DashMap::new()),
            max_session_duration: None,
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets a maximum session duration safety valve.
    ///
    /// On expiry the session is cancelled; the stream ends without a
    /// trailing error, exactly like a caller cancellation.
    #[must_use]
    pub fn with_max_session_duration(mut self, duration: Duration) -> Self {
        self.max_session_duration = Some(duration);
        self
    }

    /// Starts monitoring an execution until it reaches a terminal status.
    ///
    /// Returns a cancellable stream of status snapshots. Duplicates are
    /// suppressed; the stream ends after the first terminal snapshot, a
    /// cancellation, or one final `Err` when the status call fails beyond
    /// recovery. Dropping the stream cancels the session.
    #[must_use]
    pub fn monitor(&self, execution_id: impl Into<String>, strategy: PollStrategy) -> ExecutionStream {
        let execution_id = execution_id.into();
        let state = SessionState::new(execution_id.clone(), strategy);
        let token = Arc::new(CancellationToken::new());
        let (tx, rx) = mpsc::channel(SNAPSHOT_CHANNEL_CAPACITY);

        self.sessions.insert(
            execution_id.clone(),
            SessionInfo {
                session_id: state.session_id,
                execution_id: execution_id.clone(),
                strategy: state.strategy.name(),
                current_interval: state.current_interval,
                last_status: None,
                started_at: Utc::now(),
            },
        );

        info!(
            execution_id = %execution_id,
            session_id = %state.session_id,
            strategy = state.strategy.name(),
            "Monitoring session started"
        );
        self.events.try_emit(
            event_type::SESSION_STARTED,
            Some(serde_json::json!({
                "execution_id": execution_id,
                "session_id": state.session_id.to_string(),
                "strategy": state.strategy.name(),
            })),
        );

        let task = SessionTask {
            gateway: self.gateway.clone(),
            executor: self.executor.clone(),
            events: self.events.clone(),
            sessions: self.sessions.clone(),
            token: token.clone(),
            max_session_duration: self.max_session_duration,
        };
        let handle = tokio::spawn(task.run(state, tx));

        ExecutionStream { rx, token, handle }
    }

    /// Current polling interval of a live session (diagnostics only).
    #[must_use]
    pub fn current_interval(&self, execution_id: &str) -> Option<Duration> {
        self.sessions
            .get(execution_id)
            .map(|info| info.current_interval)
    }

    /// Snapshots of all live sessions.
    #[must_use]
    pub fn active_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.iter().map(|entry| entry.clone()).collect()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl std::fmt::Debug for PollingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingEngine")
            .field("sessions", &self.sessions.len())
            .field("max_session_duration", &self.max_session_duration)
            .finish_non_exhaustive()
    }
}

/// The per-session polling loop, owned by a spawned task.
struct SessionTask {
    gateway: Arc<dyn ExecutionGateway>,
    executor: ResilientExecutor,
    events: Arc<dyn EventSink>,
    sessions: Arc<DashMap<String, SessionInfo>>,
    token: Arc<CancellationToken>,
    max_session_duration: Option<Duration>,
}

impl SessionTask {
    async fn run(
        self,
        mut state: SessionState,
        tx: mpsc::Sender<Result<ExecutionRecord, MonitorError>>,
    ) {
        let execution_id = state.execution_id.clone();
        let deadline = self
            .max_session_duration
            .map(|d| tokio::time::Instant::now() + d);

        loop {
            if self.token.is_cancelled() {
                self.emit_cancelled(&execution_id);
                break;
            }

            let gateway = self.gateway.clone();
            let id = execution_id.clone();
            let result = self
                .executor
                .execute(endpoint::GET_STATUS, move || {
                    let gateway = gateway.clone();
                    let id = id.clone();
                    async move { gateway.get_status(&id).await }
                })
                .await;

            // A cancellation that raced the in-flight call wins: no
            // further emissions once the caller asked to stop.
            if self.token.is_cancelled() {
                self.emit_cancelled(&execution_id);
                break;
            }

            match result {
                Ok(record) => match apply_tick(&mut state, record) {
                    TickOutcome::Finished { emission } => {
                        info!(
                            execution_id = %execution_id,
                            status = %emission.status,
                            "Execution reached terminal status"
                        );
                        self.events.try_emit(
                            event_type::SESSION_TERMINAL,
                            Some(serde_json::json!({
                                "execution_id": execution_id,
                                "status": emission.status.to_string(),
                            })),
                        );
                        let _ = tx.send(Ok(emission)).await;
                        break;
                    }
                    TickOutcome::Continue {
                        emission,
                        next_interval,
                    } => {
                        if let Some(record) = emission {
                            debug!(
                                execution_id = %execution_id,
                                status = %record.status,
                                "Fresh status snapshot"
                            );
                            self.events.try_emit(
                                event_type::SESSION_SNAPSHOT,
                                Some(serde_json::json!({
                                    "execution_id": execution_id,
                                    "status": record.status.to_string(),
                                })),
                            );
                            self.update_info(&execution_id, record.status, next_interval);
                            if tx.send(Ok(record)).await.is_err() {
                                // Receiver gone; stop polling
                                break;
                            }
                        } else {
                            self.update_info_interval(&execution_id, next_interval);
                        }

                        if !self.park(next_interval, deadline, &execution_id).await {
                            break;
                        }
                    }
                },
                Err(err) => {
                    warn!(
                        execution_id = %execution_id,
                        error = %err,
                        "Monitoring session terminated with error"
                    );
                    self.events.try_emit(
                        event_type::SESSION_ERROR,
                        Some(serde_json::json!({
                            "execution_id": execution_id,
                            "error": err.to_string(),
                        })),
                    );
                    let _ = tx.send(Err(MonitorError::Resilience(err))).await;
                    break;
                }
            }
        }

        self.sessions.remove(&execution_id);
    }

    /// Sleeps until the next tick. Returns false if the session must end.
    async fn park(
        &self,
        interval: Duration,
        deadline: Option<tokio::time::Instant>,
        execution_id: &str,
    ) -> bool {
        let expiry = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            () = tokio::time::sleep(interval) => true,
            () = self.token.cancelled() => {
                self.emit_cancelled(execution_id);
                false
            }
            () = expiry => {
                self.token.cancel("maximum session duration reached");
                info!(execution_id = %execution_id, "Session safety valve expired");
                self.events.try_emit(
                    event_type::SESSION_EXPIRED,
                    Some(serde_json::json!({ "execution_id": execution_id })),
                );
                false
            }
        }
    }

    fn emit_cancelled(&self, execution_id: &str) {
        let reason = self.token.reason().unwrap_or_default();
        debug!(execution_id = %execution_id, reason = %reason, "Session cancelled");
        self.events.try_emit(
            event_type::SESSION_CANCELLED,
            Some(serde_json::json!({
                "execution_id": execution_id,
                "reason": reason,
            })),
        );
    }

    fn update_info(&self, execution_id: &str, status: ExecutionStatus, interval: Duration) {
        if let Some(mut info) = self.sessions.get_mut(execution_id) {
            info.last_status = Some(status);
            info.current_interval = interval;
        }
    }

    fn update_info_interval(&self, execution_id: &str, interval: Duration) {
        if let Some(mut info) = self.sessions.get_mut(execution_id) {
            info.current_interval = interval;
        }
    }
}

/// A cancellable stream of status snapshots for one execution.
///
/// Snapshots arrive in observed order. The stream yields at most one item
/// per distinct `(status, wait_marker)` pair and ends after the first
/// terminal snapshot, a cancellation, or one final error.
pub struct ExecutionStream {
    rx: mpsc::Receiver<Result<ExecutionRecord, MonitorError>>,
    token: Arc<CancellationToken>,
    handle: JoinHandle<()>,
}

impl ExecutionStream {
    /// Cancels the session. Idempotent; in-flight calls are allowed to
    /// finish, but nothing further is emitted or scheduled.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.token.cancel(reason);
    }

    /// Returns whether the session was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The session's cancellation token, for wiring into callers' own
    /// shutdown paths.
    #[must_use]
    pub fn cancellation_token(&self) -> Arc<CancellationToken> {
        self.token.clone()
    }
}

impl Stream for ExecutionStream {
    type Item = Result<ExecutionRecord, MonitorError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for ExecutionStream {
    // Cancel rather than abort, so the session task unregisters itself
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            self.token.cancel("stream dropped");
        }
    }
}

impl std::fmt::Debug for ExecutionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionStream")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
