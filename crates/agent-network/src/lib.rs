//! Dealflow network: deal-analysis agent orchestration
//!
//! This crate provides:
//! - Capability providers (LLM completions, market data) behind traits
//! - The orchestrator, target finder and valuer agents
//! - An Agent Runner that records each agent's lifecycle
//! - Mode routing onto petgraph pipelines, driven by one Workflow Engine
//! - A bounded worker pool and the Workflow Service façade
//! - Real-time status streaming

pub mod agents;
pub mod error;
pub mod execution_manager;
pub mod providers;
pub mod runner;
pub mod service;
pub mod status_stream;
pub mod workflow;

// Re-exports
pub use agents::{Agent, AgentPayload, AgentPool, TypedAgent};
pub use error::{AgentError, EngineError, ProviderError, ServiceError};
pub use execution_manager::ExecutionManager;
pub use providers::{LlmProvider, MarketData, MarketDataProvider};
pub use runner::AgentRunner;
pub use service::WorkflowService;
pub use status_stream::{StatusEvent, StatusEventType, StatusStream};
pub use workflow::{Pipeline, WorkflowEngine};
