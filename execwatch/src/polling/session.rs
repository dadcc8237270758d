//! Per-session polling state and the pure tick transition.
//!
//! The tick decision is deliberately separated from scheduling: given the
//! previous session state and a fresh remote snapshot, [`apply_tick`]
//! returns what to emit and when to poll next. The engine's loop around
//! it stays trivial.

use super::PollStrategy;
use crate::core::{ExecutionRecord, ExecutionStatus};
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Mutable state of one monitoring session.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Remote execution id being monitored.
    pub execution_id: String,
    /// Local session id.
    pub session_id: Uuid,
    /// Interval strategy.
    pub strategy: PollStrategy,
    /// Interval chosen by the most recent tick.
    pub current_interval: Duration,
    /// Dedupe key of the last snapshot handed to the caller.
    pub last_emitted: Option<(ExecutionStatus, Option<serde_json::Value>)>,
    /// When the last tick was applied.
    pub last_activity_at: DateTime<Utc>,
    /// Ticks in a row that observed the same dedupe key.
    pub consecutive_identical: u32,
}

impl SessionState {
    /// Creates fresh state for an execution.
    #[must_use]
    pub fn new(execution_id: impl Into<String>, strategy: PollStrategy) -> Self {
        let current_interval = strategy.initial_interval();
        Self {
            execution_id: execution_id.into(),
            session_id: Uuid::new_v4(),
            strategy,
            current_interval,
            last_emitted: None,
            last_activity_at: Utc::now(),
            consecutive_identical: 0,
        }
    }

    fn matches_last_emitted(&self, record: &ExecutionRecord) -> bool {
        self.last_emitted
            .as_ref()
            .map(|(status, marker)| (*status, marker.as_ref()))
            == Some(record.dedupe_key())
    }
}

/// The decision produced by one polling tick.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Keep polling; optionally hand a fresh snapshot to the caller.
    Continue {
        /// Snapshot to emit, absent when suppressed as a duplicate.
        emission: Option<ExecutionRecord>,
        /// Delay before the next tick.
        next_interval: Duration,
    },
    /// Terminal status observed; emit the final snapshot and stop.
    Finished {
        /// The terminal snapshot.
        emission: ExecutionRecord,
    },
}

/// Applies one observed snapshot to the session state.
///
/// Duplicate snapshots (same status and, for waiting executions, the same
/// wait marker) are suppressed. A terminal snapshot always finishes the
/// session; no snapshot is ever produced after it.
pub fn apply_tick(state: &mut SessionState, record: ExecutionRecord) -> TickOutcome {
    state.last_activity_at = Utc::now();

    let is_duplicate = state.matches_last_emitted(&record);
    if is_duplicate {
        state.consecutive_identical = state.consecutive_identical.saturating_add(1);
    } else {
        state.consecutive_identical = 0;
    }

    if record.is_terminal() {
        return TickOutcome::Finished { emission: record };
    }

    let next_interval = state
        .strategy
        .next_interval(record.status, state.consecutive_identical);
    state.current_interval = next_interval;

    let emission = if is_duplicate {
        None
    } else {
        state.last_emitted = Some((record.status, record.wait_marker.clone()));
        Some(record)
    };

    TickOutcome::Continue {
        emission,
        next_interval,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn running(id: &str) -> ExecutionRecord {
        ExecutionRecord::new(id, ExecutionStatus::Running)
    }

    fn fixed_state(id: &str) -> SessionState {
        SessionState::new(id, PollStrategy::fixed(Duration::from_millis(100)))
    }

    #[test]
    fn test_first_snapshot_is_emitted() {
        let mut state = fixed_state("exec-1");

        match apply_tick(&mut state, running("exec-1")) {
            TickOutcome::Continue { emission, .. } => {
                assert!(emission.is_some());
            }
            TickOutcome::Finished { .. } => panic!("running is not terminal"),
        }
    }

    #[test]
    fn test_duplicate_snapshots_suppressed() {
        let mut state = fixed_state("exec-1");

        apply_tick(&mut state, running("exec-1"));
        match apply_tick(&mut state, running("exec-1")) {
            TickOutcome::Continue { emission, .. } => {
                assert!(emission.is_none());
            }
            TickOutcome::Finished { .. } => panic!("running is not terminal"),
        }
        assert_eq!(state.consecutive_identical, 1);
    }

    #[test]
    fn test_wait_marker_change_reemits() {
        let mut state = fixed_state("exec-1");

        let first = ExecutionRecord::new("exec-1", ExecutionStatus::Waiting)
            .with_wait_marker(serde_json::json!({"form": "a"}));
        let second = ExecutionRecord::new("exec-1", ExecutionStatus::Waiting)
            .with_wait_marker(serde_json::json!({"form": "b"}));

        apply_tick(&mut state, first);
        match apply_tick(&mut state, second) {
            TickOutcome::Continue { emission, .. } => {
                assert!(emission.is_some(), "new wait marker must be emitted");
            }
            TickOutcome::Finished { .. } => panic!("waiting is not terminal"),
        }
        assert_eq!(state.consecutive_identical, 0);
    }

    #[test]
    fn test_terminal_finishes_session() {
        let mut state = fixed_state("exec-1");
        apply_tick(&mut state, running("exec-1"));

        let terminal = ExecutionRecord::new("exec-1", ExecutionStatus::Success);
        match apply_tick(&mut state, terminal) {
            TickOutcome::Finished { emission } => {
                assert_eq!(emission.status, ExecutionStatus::Success);
            }
            TickOutcome::Continue { .. } => panic!("terminal must finish"),
        }
    }

    #[test]
    fn test_status_sequence_emission_count() {
        // Running, Running, Waiting, Waiting, Success yields exactly
        // Running, Waiting, Success.
        let mut state = fixed_state("exec-1");
        let waiting = ExecutionRecord::new("exec-1", ExecutionStatus::Waiting)
            .with_wait_marker(serde_json::json!({"form": "sign-off"}));

        let sequence = vec![
            running("exec-1"),
            running("exec-1"),
            waiting.clone(),
            waiting,
            ExecutionRecord::new("exec-1", ExecutionStatus::Success),
        ];

        let mut emitted = Vec::new();
        for record in sequence {
            match apply_tick(&mut state, record) {
                TickOutcome::Continue { emission, .. } => {
                    if let Some(rec) = emission {
                        emitted.push(rec.status);
                    }
                }
                TickOutcome::Finished { emission } => {
                    emitted.push(emission.status);
                }
            }
        }

        assert_eq!(
            emitted,
            vec![
                ExecutionStatus::Running,
                ExecutionStatus::Waiting,
                ExecutionStatus::Success,
            ]
        );
    }

    #[test]
    fn test_idle_ticks_stretch_interval() {
        let strategy = PollStrategy::Adaptive {
            base_ms: 100,
            max_ms: 1000,
            wait_ms: 5000,
        };
        let mut state = SessionState::new("exec-1", strategy);

        apply_tick(&mut state, running("exec-1"));
        assert_eq!(state.current_interval, Duration::from_millis(100));

        apply_tick(&mut state, running("exec-1"));
        assert_eq!(state.current_interval, Duration::from_millis(200));

        apply_tick(&mut state, running("exec-1"));
        assert_eq!(state.current_interval, Duration::from_millis(300));
    }

    #[test]
    fn test_activity_timestamp_updates() {
        let mut state = fixed_state("exec-1");
        let before = state.last_activity_at;

        std::thread::sleep(Duration::from_millis(2));
        apply_tick(&mut state, running("exec-1"));

        assert!(state.last_activity_at > before);
    }
}
