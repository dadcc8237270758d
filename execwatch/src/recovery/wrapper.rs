//! The recovering stream combinator.

use super::{RecoveryPolicy, RecoveryStrategy, Restart};
use crate::errors::RecoverableError;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, warn};

/// Wraps a fallible stream with a recovery policy.
///
/// `factory` builds (and rebuilds) the source. `Restart::Fresh` is passed
/// on the initial subscription and by `RestartFromSource`;
/// `Restart::Resume { delivered }` is passed by `Retry` so sources that
/// can seek may skip what the caller already received.
pub fn wrap_stream<T, E, S, F>(factory: F, policy: RecoveryPolicy<T>) -> RecoveringStream<T, E, S, F>
where
    S: Stream<Item = Result<T, E>>,
    F: FnMut(Restart) -> S,
{
    RecoveringStream::new(factory, policy)
}

enum StreamPhase<S> {
    /// Consuming the current subscription.
    Active(Pin<Box<S>>),
    /// Waiting out the backoff before re-invoking the factory.
    Recovering {
        sleep: Pin<Box<tokio::time::Sleep>>,
        restart: Restart,
    },
    /// Completed, errored out, or fallen back.
    Done,
}

/// A stream that applies a [`RecoveryPolicy`] to errors from its source.
///
/// The recovery budget covers the stream's whole lifetime; it is not
/// replenished by successful items.
pub struct RecoveringStream<T, E, S, F>
where
    S: Stream<Item = Result<T, E>>,
    F: FnMut(Restart) -> S,
{
    factory: F,
    policy: RecoveryPolicy<T>,
    phase: StreamPhase<S>,
    delivered: usize,
    recoveries: usize,
}

impl<T, E, S, F> RecoveringStream<T, E, S, F>
where
    S: Stream<Item = Result<T, E>>,
    F: FnMut(Restart) -> S,
{
    fn new(mut factory: F, policy: RecoveryPolicy<T>) -> Self {
        let initial = factory(Restart::Fresh);
        Self {
            factory,
            policy,
            phase: StreamPhase::Active(Box::pin(initial)),
            delivered: 0,
            recoveries: 0,
        }
    }

    /// Items handed to the caller so far.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Recovery attempts consumed so far.
    #[must_use]
    pub fn recoveries(&self) -> usize {
        self.recoveries
    }

    /// Schedules a re-subscription, or returns the error when the budget
    /// is spent.
    fn begin_recovery(&mut self, error: E, restart: Restart) -> Option<E> {
        if self.recoveries >= self.policy.max_retries {
            self.phase = StreamPhase::Done;
            return Some(error);
        }

        let delay = self.policy.backoff_delay(self.recoveries as u32);
        self.recoveries += 1;
        debug!(
            strategy = self.policy.strategy.name(),
            recovery = self.recoveries,
            delay_ms = delay.as_millis() as u64,
            "Stream recovery scheduled"
        );
        self.phase = StreamPhase::Recovering {
            sleep: Box::pin(tokio::time::sleep(delay)),
            restart,
        };
        None
    }
}

impl<T, E, S, F> Stream for RecoveringStream<T, E, S, F>
where
    T: Clone + Unpin,
    E: RecoverableError + std::fmt::Display + Unpin,
    S: Stream<Item = Result<T, E>>,
    F: FnMut(Restart) -> S + Unpin,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match &mut this.phase {
                StreamPhase::Done => return Poll::Ready(None),
                StreamPhase::Recovering { sleep, restart } => {
                    match sleep.as_mut().poll(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(()) => {
                            let restart = *restart;
                            debug!(strategy = this.policy.strategy.name(), "Stream re-subscribed");
                            this.phase = StreamPhase::Active(Box::pin((this.factory)(restart)));
                        }
                    }
                }
                StreamPhase::Active(source) => match source.as_mut().poll_next(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(None) => {
                        this.phase = StreamPhase::Done;
                        return Poll::Ready(None);
                    }
                    Poll::Ready(Some(Ok(item))) => {
                        this.delivered += 1;
                        return Poll::Ready(Some(Ok(item)));
                    }
                    Poll::Ready(Some(Err(error))) => match &this.policy.strategy {
                        RecoveryStrategy::Escalate => {
                            this.phase = StreamPhase::Done;
                            return Poll::Ready(Some(Err(error)));
                        }
                        RecoveryStrategy::Fallback(value) => {
                            debug!(error = %error, "Substituting fallback value");
                            let value = value.clone();
                            this.phase = StreamPhase::Done;
                            this.delivered += 1;
                            return Poll::Ready(Some(Ok(value)));
                        }
                        RecoveryStrategy::SkipAndContinue => {
                            if error.is_fatal() {
                                this.phase = StreamPhase::Done;
                                return Poll::Ready(Some(Err(error)));
                            }
                            warn!(error = %error, "Skipping stream error");
                        }
                        RecoveryStrategy::Retry => {
                            let restart = Restart::Resume {
                                delivered: this.delivered,
                            };
                            if let Some(error) = this.begin_recovery(error, restart) {
                                return Poll::Ready(Some(Err(error)));
                            }
                        }
                        RecoveryStrategy::RestartFromSource => {
                            if let Some(error) = this.begin_recovery(error, Restart::Fresh) {
                                return Poll::Ready(Some(Err(error)));
                            }
                            this.delivered = 0;
                        }
                    },
                },
            }
        }
    }
}

impl<T, E, S, F> std::fmt::Debug for RecoveringStream<T, E, S, F>
where
    S: Stream<Item = Result<T, E>>,
    F: FnMut(Restart) -> S,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveringStream")
            .field("strategy", &self.policy.strategy.name())
            .field("delivered", &self.delivered)
            .field("recoveries", &self.recoveries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GatewayError;
    use futures::stream;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn fast<T>(policy: RecoveryPolicy<T>) -> RecoveryPolicy<T> {
        policy.with_base_delay_ms(1).with_jitter_ratio(0.0)
    }

    fn items(values: Vec<Result<u32, GatewayError>>) -> impl Stream<Item = Result<u32, GatewayError>> {
        stream::iter(values)
    }

    #[tokio::test]
    async fn test_clean_stream_passes_through() {
        let wrapped = wrap_stream(
            |_| items(vec![Ok(1), Ok(2), Ok(3)]),
            RecoveryPolicy::escalate(),
        );
        let collected: Vec<_> = wrapped.map(Result::unwrap).collect().await;
        assert_eq!(collected, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_escalate_propagates_first_error() {
        let wrapped = wrap_stream(
            |_| {
                items(vec![
                    Ok(1),
                    Err(GatewayError::network("reset")),
                    Ok(2),
                ])
            },
            RecoveryPolicy::escalate(),
        );
        let collected: Vec<_> = wrapped.collect().await;

        assert_eq!(collected.len(), 2);
        assert_eq!(*collected[0].as_ref().unwrap(), 1);
        assert!(collected[1].is_err());
    }

    #[tokio::test]
    async fn test_fallback_never_propagates() {
        let wrapped = wrap_stream(
            |_| items(vec![Ok(1), Err(GatewayError::timeout("slow"))]),
            fast(RecoveryPolicy::fallback(99)),
        );
        let collected: Vec<_> = wrapped.collect().await;

        assert!(collected.iter().all(Result::is_ok));
        let values: Vec<_> = collected.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, vec![1, 99]);
    }

    #[tokio::test]
    async fn test_retry_resumes_with_delivered_count() {
        let observed = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let observed_in_factory = observed.clone();

        let wrapped = wrap_stream(
            move |restart| {
                observed_in_factory.lock().push(restart);
                match restart {
                    Restart::Fresh => items(vec![
                        Ok(1),
                        Ok(2),
                        Err(GatewayError::network("dropped")),
                    ]),
                    Restart::Resume { .. } => items(vec![Ok(3)]),
                }
            },
            fast(RecoveryPolicy::retry()),
        );
        let values: Vec<_> = wrapped.map(Result::unwrap).collect().await;

        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(
            *observed.lock(),
            vec![Restart::Fresh, Restart::Resume { delivered: 2 }]
        );
    }

    #[tokio::test]
    async fn test_retry_budget_exhausts_with_last_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_factory = calls.clone();

        let wrapped = wrap_stream(
            move |_| {
                calls_in_factory.fetch_add(1, Ordering::SeqCst);
                items(vec![Err(GatewayError::network("still down"))])
            },
            fast(RecoveryPolicy::retry().with_max_retries(2)),
        );
        let collected: Vec<_> = wrapped.collect().await;

        // Initial subscription plus two recoveries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(collected.len(), 1);
        assert!(collected[0].is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_waits_out_backoff() {
        let wrapped = wrap_stream(
            |restart| match restart {
                Restart::Fresh => items(vec![Err(GatewayError::network("drop"))]),
                Restart::Resume { .. } => items(vec![Ok(5)]),
            },
            RecoveryPolicy::retry()
                .with_base_delay_ms(10_000)
                .with_jitter_ratio(0.0),
        );

        let before = tokio::time::Instant::now();
        let values: Vec<_> = wrapped.map(Result::unwrap).collect().await;

        assert_eq!(values, vec![5]);
        assert!(before.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_restart_from_source_starts_fresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_factory = calls.clone();

        let wrapped = wrap_stream(
            move |restart| {
                let call = calls_in_factory.fetch_add(1, Ordering::SeqCst);
                assert_eq!(restart, Restart::Fresh);
                if call == 0 {
                    items(vec![Ok(1), Err(GatewayError::timeout("hiccup"))])
                } else {
                    items(vec![Ok(1), Ok(2)])
                }
            },
            fast(RecoveryPolicy::restart_from_source()),
        );
        let values: Vec<_> = wrapped.map(Result::unwrap).collect().await;

        // The restart replays from the beginning
        assert_eq!(values, vec![1, 1, 2]);
    }

    #[tokio::test]
    async fn test_skip_and_continue_ignores_transient_errors() {
        let wrapped = wrap_stream(
            |_| {
                items(vec![
                    Ok(1),
                    Err(GatewayError::server(503, "blip")),
                    Ok(2),
                ])
            },
            RecoveryPolicy::skip_and_continue(),
        );
        let values: Vec<_> = wrapped.map(Result::unwrap).collect().await;
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_skip_and_continue_stops_on_fatal() {
        let wrapped = wrap_stream(
            |_| {
                items(vec![
                    Ok(1),
                    Err(GatewayError::auth("token revoked")),
                    Ok(2),
                ])
            },
            RecoveryPolicy::skip_and_continue(),
        );
        let collected: Vec<_> = wrapped.collect().await;

        assert_eq!(collected.len(), 2);
        assert!(matches!(
            collected[1],
            Err(GatewayError::Auth(_))
        ));
    }
}
