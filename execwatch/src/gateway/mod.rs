//! The remote execution gateway seam.
//!
//! Transport is out of scope for this crate: callers supply an
//! [`ExecutionGateway`] implementation and the runtime only sees typed
//! results and typed failures. Endpoint keys identify logical operations
//! for circuit-breaker bookkeeping, not URLs.

use crate::core::ExecutionRecord;
use crate::errors::GatewayError;
use async_trait::async_trait;

/// Canonical endpoint keys for circuit-breaker state.
///
/// All gateway implementations should report failures under these keys so
/// that every caller of, say, get-status shares one circuit.
pub mod endpoint {
    /// Start a new execution from a trigger.
    pub const START: &str = "start-execution";
    /// Fetch the current status snapshot of an execution.
    pub const GET_STATUS: &str = "get-status";
    /// Resume a waiting execution with external input.
    pub const RESUME: &str = "resume-execution";
    /// Cancel a running execution.
    pub const CANCEL: &str = "cancel-execution";
}

/// The four raw remote operations the runtime consumes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Starts a new execution for the given trigger and returns its id.
    async fn start_execution(
        &self,
        trigger_id: &str,
        payload: serde_json::Value,
    ) -> Result<String, GatewayError>;

    /// Fetches the current snapshot of an execution.
    ///
    /// A paused execution is surfaced through
    /// [`ExecutionRecord::wait_marker`].
    async fn get_status(&self, execution_id: &str) -> Result<ExecutionRecord, GatewayError>;

    /// Resumes a waiting execution with external input.
    async fn resume_execution(
        &self,
        execution_id: &str,
        input: serde_json::Value,
    ) -> Result<(), GatewayError>;

    /// Cancels an execution remotely.
    async fn cancel_execution(&self, execution_id: &str) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExecutionStatus;

    #[tokio::test]
    async fn test_mock_gateway_get_status() {
        let mut gateway = MockExecutionGateway::new();
        gateway.expect_get_status().returning(|id| {
            Ok(ExecutionRecord::new(id, ExecutionStatus::Running))
        });

        let record = gateway.get_status("exec-9").await.unwrap();
        assert_eq!(record.id, "exec-9");
        assert_eq!(record.status, ExecutionStatus::Running);
    }

    #[tokio::test]
    async fn test_mock_gateway_start_failure() {
        let mut gateway = MockExecutionGateway::new();
        gateway
            .expect_start_execution()
            .returning(|_, _| Err(GatewayError::timeout("no answer in 5s")));

        let err = gateway
            .start_execution("trigger-1", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
