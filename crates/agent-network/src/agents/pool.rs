//! Agent pool management

use crate::agents::{Agent, OrchestratorAgent, TargetFinderAgent, ValuerAgent};
use crate::providers::{LlmProvider, MarketDataProvider};
use std::collections::HashMap;
use std::sync::Arc;

/// Name-keyed registry the engine resolves pipeline steps against
#[derive(Clone, Default)]
pub struct AgentPool {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// The orchestrator, target finder and valuer wired to the given providers
    pub fn standard(
        llm: Arc<dyn LlmProvider>,
        market: Arc<dyn MarketDataProvider>,
        temperature: f32,
    ) -> Self {
        Self::new()
            .with_agent(Arc::new(OrchestratorAgent::new(llm.clone(), temperature)))
            .with_agent(Arc::new(TargetFinderAgent::new(
                llm.clone(),
                market.clone(),
                temperature,
            )))
            .with_agent(Arc::new(ValuerAgent::new(llm, market, temperature)))
    }

    /// Register an agent under its own name, replacing any previous one
    pub fn register(&mut self, agent: Arc<dyn Agent>) -> Option<Arc<dyn Agent>> {
        self.agents.insert(agent.name().to_string(), agent)
    }

    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.register(agent);
        self
    }

    pub fn get_agent(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    /// Sorted for stable output
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
