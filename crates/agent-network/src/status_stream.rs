//! Real-time status streaming via channels

use chrono::{DateTime, Utc};
use dealflow_common::{Mode, WorkflowId, WorkflowStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub event_type: StatusEventType,
    pub workflow_id: WorkflowId,
    pub agent_name: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusEventType {
    WorkflowStarted,
    WorkflowRouted,
    AgentStarted,
    AgentCompleted,
    AgentFailed,
    WorkflowCompleted,
    WorkflowFailed,
}

impl StatusEventType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::WorkflowCompleted | Self::WorkflowFailed)
    }

    /// Workflow status implied by the event, if it changes one
    pub fn workflow_status(&self) -> Option<WorkflowStatus> {
        match self {
            Self::WorkflowStarted => Some(WorkflowStatus::Routing),
            Self::WorkflowRouted => Some(WorkflowStatus::Executing),
            Self::WorkflowCompleted => Some(WorkflowStatus::Completed),
            Self::WorkflowFailed => Some(WorkflowStatus::Failed),
            _ => None,
        }
    }
}

/// Process-wide broadcast of workflow progress. Sending never blocks; slow
/// subscribers observe `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct StatusStream {
    sender: broadcast::Sender<StatusEvent>,
}

impl StatusStream {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Emit status event
    pub fn emit(&self, event: StatusEvent) {
        // Ignore send errors (no receivers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to status events
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    fn emit_event(
        &self,
        event_type: StatusEventType,
        workflow_id: &WorkflowId,
        agent_name: Option<&str>,
        message: String,
    ) {
        self.emit(StatusEvent {
            event_type,
            workflow_id: workflow_id.clone(),
            agent_name: agent_name.map(str::to_string),
            message,
            timestamp: Utc::now(),
        });
    }

    pub fn emit_workflow_started(&self, workflow_id: &WorkflowId) {
        self.emit_event(
            StatusEventType::WorkflowStarted,
            workflow_id,
            None,
            "Routing request".to_string(),
        );
    }

    pub fn emit_workflow_routed(&self, workflow_id: &WorkflowId, mode: Mode) {
        self.emit_event(
            StatusEventType::WorkflowRouted,
            workflow_id,
            None,
            format!("Routed to {}", mode),
        );
    }

    pub fn emit_agent_started(&self, workflow_id: &WorkflowId, agent_name: &str) {
        self.emit_event(
            StatusEventType::AgentStarted,
            workflow_id,
            Some(agent_name),
            format!("{} started", agent_name),
        );
    }

    pub fn emit_agent_completed(&self, workflow_id: &WorkflowId, agent_name: &str, secs: f64) {
        self.emit_event(
            StatusEventType::AgentCompleted,
            workflow_id,
            Some(agent_name),
            format!("{} completed in {:.2}s", agent_name, secs),
        );
    }

    pub fn emit_agent_failed(&self, workflow_id: &WorkflowId, agent_name: &str, error: &str) {
        self.emit_event(
            StatusEventType::AgentFailed,
            workflow_id,
            Some(agent_name),
            error.to_string(),
        );
    }

    pub fn emit_workflow_completed(&self, workflow_id: &WorkflowId) {
        self.emit_event(
            StatusEventType::WorkflowCompleted,
            workflow_id,
            None,
            "Workflow completed".to_string(),
        );
    }

    pub fn emit_workflow_failed(&self, workflow_id: &WorkflowId, reason: &str) {
        self.emit_event(
            StatusEventType::WorkflowFailed,
            workflow_id,
            None,
            reason.to_string(),
        );
    }
}

impl Default for StatusStream {
    fn default() -> Self {
        Self::new()
    }
}
