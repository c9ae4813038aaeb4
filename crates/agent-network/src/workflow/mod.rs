//! Pipeline DAG handling and workflow execution

pub mod builder;
pub mod engine;
pub mod router;

pub use builder::PipelineBuilder;
pub use engine::WorkflowEngine;
pub use router::route;

use crate::agents::{TARGET_FINDER, VALUER};
use crate::error::{EngineError, EngineResult};
use dealflow_common::Mode;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};

/// Pipeline graph type
pub type PipelineGraph = DiGraph<StepNode, DependencyEdge>;

/// One agent step in a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepNode {
    pub agent_name: String,
}

/// Dependency edge between steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub dependency_type: DependencyType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyType {
    /// Downstream step reads the upstream step's result
    Sequential,
}

/// Agents run after routing, in order
pub fn pipeline_agents(mode: Mode) -> &'static [&'static str] {
    match mode {
        Mode::BuyerMa | Mode::SellerMa => &[TARGET_FINDER, VALUER],
        Mode::Ipo => &[VALUER],
        Mode::Unknown => &[],
    }
}

/// The ordered agent steps for one mode
#[derive(Debug, Clone)]
pub struct Pipeline {
    graph: PipelineGraph,
}

impl Pipeline {
    pub fn for_mode(mode: Mode) -> EngineResult<Self> {
        let mut builder = PipelineBuilder::new();
        let mut previous: Option<&str> = None;

        for &agent in pipeline_agents(mode) {
            builder.add_step(StepNode {
                agent_name: agent.to_string(),
            })?;
            if let Some(upstream) = previous {
                builder.add_dependency(upstream, agent, DependencyType::Sequential)?;
            }
            previous = Some(agent);
        }

        Ok(Self {
            graph: builder.build(),
        })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Agent names in dependency order
    pub fn execution_order(&self) -> EngineResult<Vec<String>> {
        let sorted = toposort(&self.graph, None)
            .map_err(|_| EngineError::pipeline("pipeline contains cycles"))?;

        Ok(sorted
            .into_iter()
            .map(|idx| self.graph[idx].agent_name.clone())
            .collect())
    }
}
