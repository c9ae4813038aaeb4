//! Base agent traits
//!
//! [`Agent`] is the object-safe contract the runner drives. Concrete agents
//! implement [`TypedAgent`] with a structured `Output` and get `Agent` through
//! the blanket impl below.

use crate::error::{AgentError, AgentOutcome};
use async_trait::async_trait;
use dealflow_common::WorkflowState;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable name; also the key in `agent_results`
    fn name(&self) -> &str;

    /// Produce a payload from the current state. Must not mutate anything the
    /// engine owns; all bookkeeping is done by the runner.
    async fn execute_logic(&self, state: &WorkflowState) -> AgentOutcome<Value>;

    /// Human-readable line for the message log after a successful run
    fn describe_outcome(&self, payload: &Value) -> String {
        let _ = payload;
        format!("{} completed.", Agent::name(self))
    }
}

#[async_trait]
pub trait TypedAgent: Send + Sync {
    type Output: Serialize + DeserializeOwned + Send + Sync;

    fn name(&self) -> &str;

    async fn run(&self, state: &WorkflowState) -> AgentOutcome<Self::Output>;

    fn summarize(&self, output: &Self::Output) -> String;
}

// Blanket implementation: any TypedAgent automatically becomes an Agent
#[async_trait]
impl<T> Agent for T
where
    T: TypedAgent,
{
    fn name(&self) -> &str {
        TypedAgent::name(self)
    }

    async fn execute_logic(&self, state: &WorkflowState) -> AgentOutcome<Value> {
        let output = self.run(state).await?;
        serde_json::to_value(&output).map_err(|e| {
            AgentError::malformed(format!(
                "{} payload did not serialize: {}",
                TypedAgent::name(self),
                e
            ))
        })
    }

    fn describe_outcome(&self, payload: &Value) -> String {
        match serde_json::from_value::<T::Output>(payload.clone()) {
            Ok(output) => self.summarize(&output),
            Err(_) => format!("{} completed.", TypedAgent::name(self)),
        }
    }
}
