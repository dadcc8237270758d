//! Execution status enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The remote status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Execution accepted but not yet started.
    New,
    /// Execution is actively running.
    Running,
    /// Execution is paused, awaiting external input.
    Waiting,
    /// Execution finished successfully.
    Success,
    /// Execution finished with an error.
    Error,
    /// Execution was cancelled remotely.
    Canceled,
    /// Execution died without reporting a result.
    Crashed,
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self::New
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Running => write!(f, "running"),
            Self::Waiting => write!(f, "waiting"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Canceled => write!(f, "canceled"),
            Self::Crashed => write!(f, "crashed"),
        }
    }
}

impl ExecutionStatus {
    /// Returns true if no further state changes can occur.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Error | Self::Canceled | Self::Crashed
        )
    }

    /// Returns true if the execution finished successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the execution is paused awaiting external input.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Waiting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ExecutionStatus::New.to_string(), "new");
        assert_eq!(ExecutionStatus::Running.to_string(), "running");
        assert_eq!(ExecutionStatus::Waiting.to_string(), "waiting");
        assert_eq!(ExecutionStatus::Crashed.to_string(), "crashed");
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(ExecutionStatus::Success.is_terminal());
        assert!(ExecutionStatus::Error.is_terminal());
        assert!(ExecutionStatus::Canceled.is_terminal());
        assert!(ExecutionStatus::Crashed.is_terminal());
        assert!(!ExecutionStatus::New.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(!ExecutionStatus::Waiting.is_terminal());
    }

    #[test]
    fn test_status_serialize() {
        let status = ExecutionStatus::Waiting;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#""waiting""#);

        let deserialized: ExecutionStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, ExecutionStatus::Waiting);
    }
}
