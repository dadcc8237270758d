//! Record fixtures for tests.

use crate::core::{ExecutionRecord, ExecutionStatus};

/// A running record for the given execution id.
#[must_use]
pub fn running_record(execution_id: &str) -> ExecutionRecord {
    ExecutionRecord::new(execution_id, ExecutionStatus::Running)
}

/// A waiting record carrying a wait marker.
#[must_use]
pub fn waiting_record(execution_id: &str, marker: serde_json::Value) -> ExecutionRecord {
    ExecutionRecord::new(execution_id, ExecutionStatus::Waiting).with_wait_marker(marker)
}

/// A successful terminal record.
#[must_use]
pub fn success_record(execution_id: &str) -> ExecutionRecord {
    ExecutionRecord::new(execution_id, ExecutionStatus::Success)
        .with_finished_at(chrono::Utc::now())
}

/// Records for a sequence of statuses, in order.
#[must_use]
pub fn record_sequence(execution_id: &str, statuses: &[ExecutionStatus]) -> Vec<ExecutionRecord> {
    statuses
        .iter()
        .map(|status| ExecutionRecord::new(execution_id, *status))
        .collect()
}
