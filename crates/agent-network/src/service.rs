//! Workflow Service: the façade callers (HTTP, CLI) talk to

use crate::agents::AgentPool;
use crate::error::{ServiceError, ServiceResult};
use crate::execution_manager::{ExecutionManager, WorkItem};
use crate::providers::{self, LlmProvider, MarketDataProvider, OpenAiCompatibleLlm};
use crate::status_stream::{StatusEvent, StatusStream};
use crate::workflow::WorkflowEngine;
use dealflow_common::{
    DealInfo, EngineConfig, Role, SystemConfig, WorkflowId, WorkflowSnapshot, WorkflowStatus,
    WorkflowSummary,
};
use dealflow_storage::WorkflowStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

pub struct WorkflowService {
    store: Arc<dyn WorkflowStore>,
    manager: ExecutionManager,
    status: Arc<StatusStream>,
}

impl WorkflowService {
    /// Wire a service from explicit parts and start its workers
    pub fn new(store: Arc<dyn WorkflowStore>, agents: AgentPool, config: &EngineConfig) -> Self {
        let status = Arc::new(StatusStream::new());
        let engine = Arc::new(WorkflowEngine::new(
            store.clone(),
            Arc::new(agents),
            status.clone(),
            Duration::from_secs(config.run_budget_secs),
        ));
        let manager = ExecutionManager::start(engine, config.workers, config.queue_capacity);

        Self {
            store,
            manager,
            status,
        }
    }

    /// Open storage, build the HTTP providers and the standard agents
    pub async fn from_config(config: &SystemConfig) -> ServiceResult<Self> {
        let store = dealflow_storage::initialize_storage(&config.storage).await?;
        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleLlm::from_config(&config.llm)?);
        let market: Arc<dyn MarketDataProvider> =
            providers::market_data::from_config(&config.market_data)?;

        let agents = AgentPool::standard(llm, market, config.llm.temperature);
        info!("Registered agents: {:?}", agents.names());
        Ok(Self::new(store, agents, &config.engine))
    }

    /// Start a run for `user_query` with no deal metadata
    pub async fn start(&self, user_query: &str) -> ServiceResult<WorkflowId> {
        self.start_with_deal(user_query, DealInfo::default()).await
    }

    /// Create the record, log the user's request and queue the run.
    /// Returns as soon as the run is queued.
    #[instrument(skip(self, deal))]
    pub async fn start_with_deal(
        &self,
        user_query: &str,
        deal: DealInfo,
    ) -> ServiceResult<WorkflowId> {
        let user_query = user_query.trim();
        if user_query.is_empty() {
            return Err(ServiceError::invalid_request("query must not be empty"));
        }

        let slot = self.manager.try_reserve().await?;
        let state = self.store.create(user_query, &deal).await?;
        if let Err(e) = self
            .store
            .append_message(&state.workflow_id, Role::User, user_query)
            .await
        {
            // The record will never run; close it instead of leaving it pending
            if let Err(close) = self
                .store
                .set_status(&state.workflow_id, WorkflowStatus::Failed, None)
                .await
            {
                warn!(
                    "Could not mark workflow {} failed: {}",
                    state.workflow_id, close
                );
            }
            return Err(e.into());
        }

        self.manager.submit(
            slot,
            WorkItem {
                workflow_id: state.workflow_id.clone(),
            },
        );
        info!("Accepted workflow {}", state.workflow_id);
        Ok(state.workflow_id)
    }

    pub async fn get_status(&self, workflow_id: &WorkflowId) -> ServiceResult<Option<WorkflowSnapshot>> {
        Ok(self.store.snapshot(workflow_id).await?)
    }

    pub async fn list_recent(&self, limit: usize) -> ServiceResult<Vec<WorkflowSummary>> {
        Ok(self.store.list_recent(limit).await?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.status.subscribe()
    }

    pub fn in_flight(&self) -> usize {
        self.manager.in_flight()
    }

    /// Finish queued and running workflows, then stop the workers
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }
}
