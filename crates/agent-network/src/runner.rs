//! Agent Runner: executes one agent against the workflow state and records
//! its lifecycle (in_progress, then success or error) in the store.

use crate::agents::Agent;
use crate::error::AgentError;
use crate::status_stream::StatusStream;
use dealflow_common::{AgentResult, WorkflowState};
use dealflow_storage::{StoreResult, WorkflowStore};
use std::sync::Arc;
use std::time::Instant as StdInstant;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct AgentRunner {
    store: Arc<dyn WorkflowStore>,
    status: Arc<StatusStream>,
}

impl AgentRunner {
    pub fn new(store: Arc<dyn WorkflowStore>, status: Arc<StatusStream>) -> Self {
        Self { store, status }
    }

    /// Run `agent` and persist its outcome.
    ///
    /// Agent failures (including deadline expiry) come back as an error
    /// result; only storage failures are returned as `Err`.
    #[instrument(
        name = "agent_run",
        skip(self, agent, state, deadline),
        fields(agent = %agent.name(), workflow_id = %state.workflow_id)
    )]
    pub async fn run(
        &self,
        agent: &dyn Agent,
        state: &mut WorkflowState,
        deadline: Instant,
    ) -> StoreResult<AgentResult> {
        let name = agent.name().to_string();

        let started = self
            .store
            .record_agent_result(&state.workflow_id, &AgentResult::in_progress(&name))
            .await?;
        state.apply_result(started);
        self.status.emit_agent_started(&state.workflow_id, &name);

        let timer = StdInstant::now();
        let outcome = match tokio::time::timeout_at(deadline, agent.execute_logic(state)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(AgentError::budget_exhausted()),
        };
        let elapsed = timer.elapsed().as_secs_f64();

        let result = match outcome {
            Ok(payload) => {
                info!("Agent {} succeeded in {:.2}s", name, elapsed);
                AgentResult::success(&name, payload, elapsed)
            }
            Err(e) => {
                warn!("Agent {} failed after {:.2}s: {}", name, elapsed, e);
                AgentResult::error(&name, e.to_string(), elapsed)
            }
        };

        let recorded = self
            .store
            .record_agent_result(&state.workflow_id, &result)
            .await?;
        state.apply_result(recorded.clone());

        match &recorded.error_message {
            None => self
                .status
                .emit_agent_completed(&state.workflow_id, &name, elapsed),
            Some(error) => self.status.emit_agent_failed(&state.workflow_id, &name, error),
        }

        Ok(recorded)
    }

    /// Record a step whose agent is not registered, without running anything
    pub async fn record_missing(
        &self,
        agent_name: &str,
        state: &mut WorkflowState,
    ) -> StoreResult<AgentResult> {
        let error = format!("agent {} is not registered", agent_name);
        warn!("{}", error);

        let recorded = self
            .store
            .record_agent_result(
                &state.workflow_id,
                &AgentResult::error(agent_name, AgentError::invalid_state(&error).to_string(), 0.0),
            )
            .await?;
        state.apply_result(recorded.clone());
        self.status
            .emit_agent_failed(&state.workflow_id, agent_name, &error);
        Ok(recorded)
    }
}
