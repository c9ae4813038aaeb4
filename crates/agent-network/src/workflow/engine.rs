//! Workflow Engine: the single state machine driving a run
//!
//! pending -> routing -> (orchestrator) -> executing -> pipeline agents -> completed,
//! or -> failed when the orchestrator does not succeed. Downstream agent
//! failures are recorded and the pipeline carries on. A storage failure aborts
//! the run and leaves whatever was last written.

use crate::agents::{AgentPool, ORCHESTRATOR};
use crate::error::{EngineError, EngineResult};
use crate::runner::AgentRunner;
use crate::status_stream::StatusStream;
use crate::workflow::{route, Pipeline};
use dealflow_common::{
    AgentResult, Mode, Role, WorkflowId, WorkflowState, WorkflowStatus, MAX_RUN_BUDGET_SECS,
};
use dealflow_storage::WorkflowStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    agents: Arc<AgentPool>,
    runner: AgentRunner,
    status: Arc<StatusStream>,
    run_budget: Duration,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        agents: Arc<AgentPool>,
        status: Arc<StatusStream>,
        run_budget: Duration,
    ) -> Self {
        Self {
            runner: AgentRunner::new(store.clone(), status.clone()),
            store,
            agents,
            status,
            run_budget,
        }
    }

    /// Drive one workflow from `pending` to a terminal status.
    ///
    /// Returns the final status. Workflows that are no longer pending are
    /// left untouched and their current status is returned.
    #[instrument(name = "workflow_run", skip(self), fields(workflow_id = %workflow_id))]
    pub async fn run(&self, workflow_id: &WorkflowId) -> EngineResult<WorkflowStatus> {
        let deadline = run_deadline(Instant::now(), self.run_budget);

        let mut state = self
            .store
            .get(workflow_id)
            .await?
            .ok_or_else(|| EngineError::WorkflowNotFound(workflow_id.to_string()))?;

        if state.status != WorkflowStatus::Pending {
            warn!("Workflow already {}, not running it again", state.status);
            return Ok(state.status);
        }

        self.transition(&mut state, WorkflowStatus::Routing, None)
            .await?;
        self.status.emit_workflow_started(workflow_id);

        let routing = self.run_step(ORCHESTRATOR, &mut state, deadline).await?;
        if !routing.is_success() {
            let reason = routing
                .error_message
                .as_deref()
                .unwrap_or("orchestrator did not produce a route");
            error!("Routing failed: {}", reason);

            self.say(&mut state, format!("Workflow routing failed: {}", reason))
                .await?;
            self.transition(&mut state, WorkflowStatus::Failed, None)
                .await?;
            self.status.emit_workflow_failed(workflow_id, reason);
            return Ok(WorkflowStatus::Failed);
        }

        let mode = route(&routing.result);
        let line = self.describe(&routing);
        self.say(&mut state, line).await?;
        self.transition(&mut state, WorkflowStatus::Executing, Some(mode))
            .await?;
        self.status.emit_workflow_routed(workflow_id, mode);

        let pipeline = Pipeline::for_mode(mode)?;
        let steps = pipeline.execution_order()?;
        let mut succeeded = 0;

        for agent_name in &steps {
            let result = self.run_step(agent_name, &mut state, deadline).await?;
            let line = self.describe(&result);
            if result.is_success() {
                succeeded += 1;
            }
            self.say(&mut state, line).await?;
        }

        self.say(
            &mut state,
            format!(
                "{} analysis complete: {} of {} steps succeeded. All results are available in the detailed view.",
                mode_label(mode),
                succeeded,
                steps.len()
            ),
        )
        .await?;
        self.transition(&mut state, WorkflowStatus::Completed, None)
            .await?;
        self.status.emit_workflow_completed(workflow_id);

        info!(
            "Workflow completed ({} of {} pipeline steps succeeded)",
            succeeded,
            steps.len()
        );
        Ok(WorkflowStatus::Completed)
    }

    async fn run_step(
        &self,
        agent_name: &str,
        state: &mut WorkflowState,
        deadline: Instant,
    ) -> EngineResult<AgentResult> {
        let result = match self.agents.get_agent(agent_name) {
            Some(agent) => self.runner.run(agent.as_ref(), state, deadline).await?,
            None => self.runner.record_missing(agent_name, state).await?,
        };
        Ok(result)
    }

    fn describe(&self, result: &AgentResult) -> String {
        match &result.error_message {
            Some(error) => format!("{} error: {}", result.agent_name, error),
            None => match self.agents.get_agent(&result.agent_name) {
                Some(agent) => agent.describe_outcome(&result.result),
                None => format!("{} completed.", result.agent_name),
            },
        }
    }

    async fn say(&self, state: &mut WorkflowState, content: String) -> EngineResult<()> {
        let message = self
            .store
            .append_message(&state.workflow_id, Role::Assistant, &content)
            .await?;
        state.push_message(message);
        Ok(())
    }

    async fn transition(
        &self,
        state: &mut WorkflowState,
        status: WorkflowStatus,
        mode: Option<Mode>,
    ) -> EngineResult<()> {
        self.store
            .set_status(&state.workflow_id, status, mode)
            .await?;
        state.set_status(status, mode);
        Ok(())
    }
}

/// `now + budget`, capped so a huge budget cannot overflow the clock
fn run_deadline(now: Instant, budget: Duration) -> Instant {
    now.checked_add(budget)
        .or_else(|| now.checked_add(Duration::from_secs(MAX_RUN_BUDGET_SECS)))
        .unwrap_or(now)
}

fn mode_label(mode: Mode) -> &'static str {
    match mode {
        Mode::BuyerMa => "Buy-side M&A",
        Mode::SellerMa => "Sell-side M&A",
        Mode::Ipo => "IPO",
        Mode::Unknown => "Workflow",
    }
}
