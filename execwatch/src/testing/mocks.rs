//! Scripted gateway mock.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::core::{ExecutionRecord, ExecutionStatus};
use crate::errors::GatewayError;
use crate::gateway::{endpoint, ExecutionGateway};

type StatusScript = VecDeque<Result<ExecutionRecord, GatewayError>>;

/// A gateway whose responses follow pre-recorded scripts.
///
/// Status scripts are consumed one entry per call; the final entry
/// repeats once the script runs out, so an execution scripted to end on
/// `Running` keeps reporting `Running`. Unknown execution ids answer
/// with a 404 client error. Every call increments a per-endpoint
/// counter.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    status_scripts: DashMap<String, StatusScript>,
    start_results: Mutex<VecDeque<Result<String, GatewayError>>>,
    resume_results: Mutex<VecDeque<Result<(), GatewayError>>>,
    cancel_results: Mutex<VecDeque<Result<(), GatewayError>>>,
    call_counts: DashMap<String, usize>,
}

impl ScriptedGateway {
    /// Creates an empty gateway; script it before use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts successive `get_status` responses as plain statuses.
    pub fn script_statuses(&self, execution_id: &str, statuses: Vec<ExecutionStatus>) {
        let script = statuses
            .into_iter()
            .map(|status| Ok(ExecutionRecord::new(execution_id, status)))
            .collect();
        self.status_scripts.insert(execution_id.to_string(), script);
    }

    /// Scripts successive `get_status` responses as full records.
    pub fn script_records(&self, execution_id: &str, records: Vec<ExecutionRecord>) {
        let script = records.into_iter().map(Ok).collect();
        self.status_scripts.insert(execution_id.to_string(), script);
    }

    /// Scripts `get_status` to fail with the given error on every call.
    pub fn script_status_error(&self, execution_id: &str, error: GatewayError) {
        self.status_scripts
            .insert(execution_id.to_string(), VecDeque::from([Err(error)]));
    }

    /// Scripts mixed `get_status` outcomes.
    pub fn script_status_outcomes(
        &self,
        execution_id: &str,
        outcomes: Vec<Result<ExecutionRecord, GatewayError>>,
    ) {
        self.status_scripts
            .insert(execution_id.to_string(), outcomes.into());
    }

    /// Queues a `start_execution` outcome.
    pub fn script_start(&self, outcome: Result<String, GatewayError>) {
        self.start_results.lock().push_back(outcome);
    }

    /// Queues a `resume_execution` outcome.
    pub fn script_resume(&self, outcome: Result<(), GatewayError>) {
        self.resume_results.lock().push_back(outcome);
    }

    /// Queues a `cancel_execution` outcome.
    pub fn script_cancel(&self, outcome: Result<(), GatewayError>) {
        self.cancel_results.lock().push_back(outcome);
    }

    /// Number of calls received by an endpoint.
    #[must_use]
    pub fn call_count(&self, endpoint_key: &str) -> usize {
        self.call_counts
            .get(endpoint_key)
            .map_or(0, |count| *count)
    }

    fn record_call(&self, endpoint_key: &str) {
        *self
            .call_counts
            .entry(endpoint_key.to_string())
            .or_insert(0) += 1;
    }

    fn next_scripted<T>(
        queue: &Mutex<VecDeque<Result<T, GatewayError>>>,
        endpoint_key: &str,
    ) -> Result<T, GatewayError> {
        queue.lock().pop_front().unwrap_or_else(|| {
            Err(GatewayError::client(
                404,
                format!("no scripted outcome for {endpoint_key}"),
            ))
        })
    }
}

#[async_trait]
impl ExecutionGateway for ScriptedGateway {
    async fn start_execution(
        &self,
        _trigger_id: &str,
        _payload: serde_json::Value,
    ) -> Result<String, GatewayError> {
        self.record_call(endpoint::START);
        Self::next_scripted(&self.start_results, endpoint::START)
    }

    async fn get_status(&self, execution_id: &str) -> Result<ExecutionRecord, GatewayError> {
        self.record_call(endpoint::GET_STATUS);

        let mut script = self.status_scripts.get_mut(execution_id).ok_or_else(|| {
            GatewayError::client(404, format!("unknown execution {execution_id}"))
        })?;

        if script.len() > 1 {
            script.pop_front().unwrap_or_else(|| {
                Err(GatewayError::client(404, "script exhausted"))
            })
        } else {
            script
                .front()
                .cloned()
                .unwrap_or_else(|| Err(GatewayError::client(404, "script exhausted")))
        }
    }

    async fn resume_execution(
        &self,
        _execution_id: &str,
        _input: serde_json::Value,
    ) -> Result<(), GatewayError> {
        self.record_call(endpoint::RESUME);
        Self::next_scripted(&self.resume_results, endpoint::RESUME)
    }

    async fn cancel_execution(&self, _execution_id: &str) -> Result<(), GatewayError> {
        self.record_call(endpoint::CANCEL);
        Self::next_scripted(&self.cancel_results, endpoint::CANCEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_status_script_consumed_in_order() {
        let gateway = ScriptedGateway::new();
        gateway.script_statuses(
            "exec-1",
            vec![ExecutionStatus::Running, ExecutionStatus::Success],
        );

        let first = assert_ok!(gateway.get_status("exec-1").await);
        let second = assert_ok!(gateway.get_status("exec-1").await);

        assert_eq!(first.status, ExecutionStatus::Running);
        assert_eq!(second.status, ExecutionStatus::Success);
        assert_eq!(gateway.call_count(endpoint::GET_STATUS), 2);
    }

    #[tokio::test]
    async fn test_last_status_repeats() {
        let gateway = ScriptedGateway::new();
        gateway.script_statuses("exec-1", vec![ExecutionStatus::Running]);

        for _ in 0..3 {
            let record = gateway.get_status("exec-1").await.unwrap();
            assert_eq!(record.status, ExecutionStatus::Running);
        }
    }

    #[tokio::test]
    async fn test_unknown_execution_is_client_error() {
        let gateway = ScriptedGateway::new();

        let err = gateway.get_status("missing").await.unwrap_err();
        assert!(matches!(err, GatewayError::Client { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_start_outcomes_queued() {
        let gateway = ScriptedGateway::new();
        gateway.script_start(Ok("exec-9".to_string()));
        gateway.script_start(Err(GatewayError::timeout("slow start")));

        let first = gateway
            .start_execution("trigger-1", serde_json::json!({}))
            .await;
        let second = gateway
            .start_execution("trigger-1", serde_json::json!({}))
            .await;

        assert_eq!(first.unwrap(), "exec-9");
        assert!(second.is_err());
        assert_eq!(gateway.call_count(endpoint::START), 2);
    }
}
