use crate::error::StoreResult;
use async_trait::async_trait;
use dealflow_common::{
    AgentResult, DealInfo, Message, Mode, Role, WorkflowId, WorkflowSnapshot, WorkflowState,
    WorkflowStatus, WorkflowSummary,
};

/// Durable workflow records.
///
/// Every mutating call is applied atomically: either all of its writes
/// (including the `updated_at` bump) land, or none do. Reads never observe
/// a partially applied mutation.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Insert a new record in `pending` with mode `unknown`.
    async fn create(&self, user_query: &str, deal: &DealInfo) -> StoreResult<WorkflowState>;

    /// Append to the message log. Order of successful appends is preserved.
    async fn append_message(
        &self,
        id: &WorkflowId,
        role: Role,
        content: &str,
    ) -> StoreResult<Message>;

    /// Upsert the agent's entry and set or clear `current_agent` in the same write.
    async fn record_agent_result(
        &self,
        id: &WorkflowId,
        result: &AgentResult,
    ) -> StoreResult<AgentResult>;

    /// Move the workflow forward. Mode may be supplied at most once.
    async fn set_status(
        &self,
        id: &WorkflowId,
        status: WorkflowStatus,
        mode: Option<Mode>,
    ) -> StoreResult<()>;

    async fn get(&self, id: &WorkflowId) -> StoreResult<Option<WorkflowState>>;

    /// Consistent read of one workflow with its results and messages.
    async fn snapshot(&self, id: &WorkflowId) -> StoreResult<Option<WorkflowSnapshot>>;

    /// Newest first
    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<WorkflowSummary>>;
}
