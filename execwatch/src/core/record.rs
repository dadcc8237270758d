//! Immutable execution snapshots.

use super::ExecutionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time snapshot of a remote workflow execution.
///
/// Records are owned by the polling engine for the duration of a session
/// and handed to callers by value; callers never observe a snapshot after
/// the first terminal one for the same execution id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Opaque execution identifier assigned by the remote system.
    pub id: String,
    /// Remote status at observation time.
    pub status: ExecutionStatus,
    /// When the remote execution started.
    pub started_at: DateTime<Utc>,
    /// When the remote execution finished, if terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Name of the last workflow node the execution reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_node_reached: Option<String>,
    /// Opaque payload signaling the execution is paused for external input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_marker: Option<serde_json::Value>,
    /// Remote error message, if the execution failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionRecord {
    /// Creates a new record with the given id and status.
    #[must_use]
    pub fn new(id: impl Into<String>, status: ExecutionStatus) -> Self {
        Self {
            id: id.into(),
            status,
            started_at: Utc::now(),
            finished_at: None,
            last_node_reached: None,
            wait_marker: None,
            error: None,
        }
    }

    /// Sets the finish time.
    #[must_use]
    pub fn with_finished_at(mut self, finished_at: DateTime<Utc>) -> Self {
        self.finished_at = Some(finished_at);
        self
    }

    /// Sets the last node reached.
    #[must_use]
    pub fn with_last_node(mut self, node: impl Into<String>) -> Self {
        self.last_node_reached = Some(node.into());
        self
    }

    /// Sets the wait marker.
    #[must_use]
    pub fn with_wait_marker(mut self, marker: serde_json::Value) -> Self {
        self.wait_marker = Some(marker);
        self
    }

    /// Sets the remote error message.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Returns true if this snapshot carries a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The pair used for duplicate suppression during polling.
    ///
    /// Two snapshots are considered identical when both the status and,
    /// for waiting executions, the wait marker match.
    #[must_use]
    pub fn dedupe_key(&self) -> (ExecutionStatus, Option<&serde_json::Value>) {
        (self.status, self.wait_marker.as_ref())
    }
}
