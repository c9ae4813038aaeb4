//! Agent implementations and management
//!
//! Provides the agent abstractions and the three deal-analysis agents.

pub mod base;
pub mod orchestrator;
pub mod payloads;
pub mod pool;
pub mod target_finder;
pub mod valuer;

pub use base::{Agent, TypedAgent};
pub use orchestrator::OrchestratorAgent;
pub use payloads::{
    AgentPayload, FinancialAnalysis, KeyMetrics, OrchestratorPayload, TargetCandidate,
    TargetFinderPayload, ValuationBasis, ValuationRange, ValuerPayload,
};
pub use pool::AgentPool;
pub use target_finder::TargetFinderAgent;
pub use valuer::ValuerAgent;

pub const ORCHESTRATOR: &str = "orchestrator";
pub const TARGET_FINDER: &str = "target_finder";
pub const VALUER: &str = "valuer";
