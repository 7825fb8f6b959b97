//! Contracts for the engine's external collaborators.
//!
//! The calendar engine never executes workflows, invokes services, or sends
//! notifications itself; it hands off through these narrow traits. Failures
//! behind them are non-fatal to the originating calendar operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Result;

/// Context handed to a workflow or service target on dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub entry_id: String,
    pub calendar_id: String,
    pub entry_title: String,
    pub entry_start: DateTime<Utc>,
    /// Lifecycle event name, or `time_based` for scheduled dispatch.
    pub event: String,
    pub occurred_at: DateTime<Utc>,
    pub params: HashMap<String, serde_json::Value>,
}

/// Notification delivered to a user about an entry transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub event: String,
    pub entry_id: String,
    pub entry_title: String,
    pub entry_start: DateTime<Utc>,
    pub actor_id: String,
}

/// Workflow-execution collaborator.
#[async_trait]
pub trait WorkflowExecutor: Send + Sync {
    async fn execute(&self, workflow_id: &str, version: u32, ctx: ExecutionContext) -> Result<()>;
}

/// Service-registry collaborator.
#[async_trait]
pub trait ServiceInvoker: Send + Sync {
    async fn invoke(&self, service_id: &str, method: &str, ctx: ExecutionContext) -> Result<()>;
}

/// Notification delivery collaborator.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &str, payload: NotificationPayload) -> Result<()>;
}

// ============================================================================
// Recording implementations
// ============================================================================

/// Records workflow executions in memory. Intended for tests and embedded
/// deployments without a real workflow engine.
#[derive(Default)]
pub struct RecordingWorkflowExecutor {
    calls: RwLock<Vec<(String, u32, ExecutionContext)>>,
    fail: std::sync::atomic::AtomicBool,
}

impl RecordingWorkflowExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent executions fail, for failure-isolation tests.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(String, u32, ExecutionContext)> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl WorkflowExecutor for RecordingWorkflowExecutor {
    async fn execute(&self, workflow_id: &str, version: u32, ctx: ExecutionContext) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(crate::error::CadenceError::Dispatch(format!(
                "workflow {workflow_id} unavailable"
            )));
        }
        self.calls
            .write()
            .unwrap()
            .push((workflow_id.to_string(), version, ctx));
        Ok(())
    }
}

/// Records service invocations in memory.
#[derive(Default)]
pub struct RecordingServiceInvoker {
    calls: RwLock<Vec<(String, String, ExecutionContext)>>,
}

impl RecordingServiceInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(String, String, ExecutionContext)> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl ServiceInvoker for RecordingServiceInvoker {
    async fn invoke(&self, service_id: &str, method: &str, ctx: ExecutionContext) -> Result<()> {
        self.calls
            .write()
            .unwrap()
            .push((service_id.to_string(), method.to_string(), ctx));
        Ok(())
    }
}

/// Records notifications in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<(String, NotificationPayload)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(String, NotificationPayload)> {
        self.sent.read().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.read().unwrap().len()
    }

    /// Users notified, in delivery order.
    pub fn recipients(&self) -> Vec<String> {
        self.sent.read().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: &str, payload: NotificationPayload) -> Result<()> {
        self.sent
            .write()
            .unwrap()
            .push((user_id.to_string(), payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            entry_id: "e1".to_string(),
            calendar_id: "c1".to_string(),
            entry_title: "Standup".to_string(),
            entry_start: Utc::now(),
            event: "created".to_string(),
            occurred_at: Utc::now(),
            params: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_recording_executor() {
        let exec = RecordingWorkflowExecutor::new();
        exec.execute("wf-1", 2, ctx()).await.unwrap();
        assert_eq!(exec.call_count(), 1);
        assert_eq!(exec.calls()[0].0, "wf-1");
        assert_eq!(exec.calls()[0].1, 2);
    }

    #[tokio::test]
    async fn test_failing_executor() {
        let exec = RecordingWorkflowExecutor::new();
        exec.set_failing(true);
        assert!(exec.execute("wf-1", 1, ctx()).await.is_err());
        assert_eq!(exec.call_count(), 0);
    }
}
