//! Common test utilities: scripted providers, fault-injecting store, helpers

#![allow(dead_code)]

use async_trait::async_trait;
use dealflow_common::*;
use dealflow_network::agents::{TypedAgent, ORCHESTRATOR};
use dealflow_network::error::{AgentError, ProviderError};
use dealflow_network::providers::{LlmProvider, MarketData, MarketDataProvider, ProviderResult};
use dealflow_network::{AgentPool, WorkflowService};
use dealflow_storage::{SqliteWorkflowStore, StoreError, StoreResult, WorkflowStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

pub const TARGET_TABLE: &str = "\
Shortlist below.

| Company Name | Location | Est. Revenue (USD M) | Est. EBITDA Margin | Strategic Fit Score (1-5) | Key Investment Highlights | Source/Rationale |
|---|---|---|---|---|---|---|
| Ledgerly Inc | London, UK | 100 | 20% | 5 | Embedded payments platform | Industry reports |
| Payvault | Berlin, DE | 80 | 22% | 4 | Open banking APIs | Press coverage |
| Clearstack Systems | Austin, US | 45 | 15% | 3 | Reconciliation SaaS | Analyst notes |
";

pub const VALUATION_MEMO: &str = "Valuation memo: DCF and trading comparables support the range.";

/// Which prompt a scripted completion is answering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Routing,
    Targets,
    Valuation,
}

impl Stage {
    fn of(prompt: &str) -> Option<Self> {
        if prompt.contains("confirm the workflow type") {
            Some(Self::Routing)
        } else if prompt.contains("identify potential targets") {
            Some(Self::Targets)
        } else if prompt.contains("valuation analysis") {
            Some(Self::Valuation)
        } else {
            None
        }
    }
}

/// LLM that answers by prompt stage
pub struct ScriptedLlm {
    replies: HashMap<Stage, ProviderResult<String>>,
    calls: Mutex<Vec<Stage>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedLlm {
    /// Routing reply names no mode, so the keyword result stands
    pub fn happy() -> Self {
        let mut replies = HashMap::new();
        replies.insert(Stage::Routing, Ok("Confirmed, the initial assessment stands.".to_string()));
        replies.insert(Stage::Targets, Ok(TARGET_TABLE.to_string()));
        replies.insert(Stage::Valuation, Ok(VALUATION_MEMO.to_string()));
        Self {
            replies,
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn reply(mut self, stage: Stage, text: &str) -> Self {
        self.replies.insert(stage, Ok(text.to_string()));
        self
    }

    pub fn failing(mut self, stage: Stage, error: ProviderError) -> Self {
        self.replies.insert(stage, Err(error));
        self
    }

    /// Every completion waits for and consumes one permit
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<Stage> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, _system: &str, user: &str, _temperature: f32) -> ProviderResult<String> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| ProviderError::unavailable("gate closed"))?
                .forget();
        }
        let stage = Stage::of(user).ok_or_else(|| ProviderError::malformed("unexpected prompt"))?;
        self.calls.lock().unwrap().push(stage);
        self.replies
            .get(&stage)
            .cloned()
            .unwrap_or(Err(ProviderError::Empty))
    }
}

/// Market data from a fixed symbol table, recording every lookup
#[derive(Default)]
pub struct StaticMarketData {
    known: HashMap<String, MarketData>,
    failing: bool,
    lookups: Mutex<Vec<String>>,
}

impl StaticMarketData {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every lookup errors
    pub fn broken() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn with(mut self, data: MarketData) -> Self {
        self.known.insert(data.symbol.clone(), data);
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataProvider for StaticMarketData {
    async fn lookup(&self, symbol: &str) -> ProviderResult<Option<MarketData>> {
        self.lookups.lock().unwrap().push(symbol.to_string());
        if self.failing {
            return Err(ProviderError::Timeout(Duration::from_secs(1)));
        }
        Ok(self.known.get(symbol).cloned())
    }
}

/// Orchestrator stand-in that always fails
pub struct BrokenOrchestrator;

#[async_trait]
impl TypedAgent for BrokenOrchestrator {
    type Output = serde_json::Value;

    fn name(&self) -> &str {
        ORCHESTRATOR
    }

    async fn run(&self, _state: &WorkflowState) -> Result<serde_json::Value, AgentError> {
        Err(AgentError::provider_unavailable("routing model offline"))
    }

    fn summarize(&self, _output: &serde_json::Value) -> String {
        String::new()
    }
}

/// Agent that sleeps longer than any test budget
pub struct SlowAgent {
    pub name: &'static str,
    pub delay: Duration,
}

#[async_trait]
impl TypedAgent for SlowAgent {
    type Output = serde_json::Value;

    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, _state: &WorkflowState) -> Result<serde_json::Value, AgentError> {
        tokio::time::sleep(self.delay).await;
        Ok(serde_json::json!({}))
    }

    fn summarize(&self, _output: &serde_json::Value) -> String {
        format!("{} finished", self.name)
    }
}

/// Agent whose run panics
pub struct PanickingAgent {
    pub name: &'static str,
}

#[async_trait]
impl TypedAgent for PanickingAgent {
    type Output = serde_json::Value;

    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, _state: &WorkflowState) -> Result<serde_json::Value, AgentError> {
        panic!("{} hit an unreachable branch", self.name)
    }

    fn summarize(&self, _output: &serde_json::Value) -> String {
        String::new()
    }
}

/// Store wrapper that fails the final write of one agent's result
pub struct FailingStore {
    inner: Arc<SqliteWorkflowStore>,
    fail_agent: String,
}

impl FailingStore {
    pub fn new(inner: Arc<SqliteWorkflowStore>, fail_agent: &str) -> Self {
        Self {
            inner,
            fail_agent: fail_agent.to_string(),
        }
    }
}

#[async_trait]
impl WorkflowStore for FailingStore {
    async fn create(&self, user_query: &str, deal: &DealInfo) -> StoreResult<WorkflowState> {
        self.inner.create(user_query, deal).await
    }

    async fn append_message(&self, id: &WorkflowId, role: Role, content: &str) -> StoreResult<Message> {
        self.inner.append_message(id, role, content).await
    }

    async fn record_agent_result(&self, id: &WorkflowId, result: &AgentResult) -> StoreResult<AgentResult> {
        if result.agent_name == self.fail_agent && result.status.is_finished() {
            return Err(StoreError::corrupt("simulated write failure"));
        }
        self.inner.record_agent_result(id, result).await
    }

    async fn set_status(&self, id: &WorkflowId, status: WorkflowStatus, mode: Option<Mode>) -> StoreResult<()> {
        self.inner.set_status(id, status, mode).await
    }

    async fn get(&self, id: &WorkflowId) -> StoreResult<Option<WorkflowState>> {
        self.inner.get(id).await
    }

    async fn snapshot(&self, id: &WorkflowId) -> StoreResult<Option<WorkflowSnapshot>> {
        self.inner.snapshot(id).await
    }

    async fn list_recent(&self, limit: usize) -> StoreResult<Vec<WorkflowSummary>> {
        self.inner.list_recent(limit).await
    }
}

/// File-backed store in a fresh temp dir
pub async fn setup_store() -> (TempDir, Arc<SqliteWorkflowStore>) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("dealflow.db").display());
    let store = SqliteWorkflowStore::connect(&url, 4)
        .await
        .expect("Failed to open test database");
    (dir, Arc::new(store))
}

pub fn engine_config(workers: usize, queue_capacity: usize) -> EngineConfig {
    EngineConfig {
        workers,
        queue_capacity,
        run_budget_secs: 30,
    }
}

pub fn standard_pool(llm: Arc<ScriptedLlm>, market: Arc<StaticMarketData>) -> AgentPool {
    AgentPool::standard(llm, market, 0.0)
}

/// Poll until the workflow reaches a terminal status
pub async fn wait_for_terminal(service: &WorkflowService, id: &WorkflowId) -> WorkflowSnapshot {
    for _ in 0..500 {
        if let Some(snapshot) = service.get_status(id).await.unwrap() {
            if snapshot.workflow.status.is_terminal() {
                return snapshot;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("workflow {} did not finish in time", id);
}

/// Poll until nothing is queued or running
pub async fn wait_for_idle(service: &WorkflowService) {
    for _ in 0..500 {
        if service.in_flight() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("worker pool did not go idle in time");
}

pub fn init_test_logging() {
    dealflow_common::tracing_setup::init_test_tracing();
}
