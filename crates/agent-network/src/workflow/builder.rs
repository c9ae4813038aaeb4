//! Pipeline graph builder using petgraph

use crate::error::{EngineError, EngineResult};
use crate::workflow::{DependencyEdge, DependencyType, PipelineGraph, StepNode};
use petgraph::graph::NodeIndex;
use std::collections::HashMap;

pub struct PipelineBuilder {
    graph: PipelineGraph,
    step_indices: HashMap<String, NodeIndex>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            graph: PipelineGraph::new(),
            step_indices: HashMap::new(),
        }
    }

    /// Add a step node. Each agent may appear once per pipeline.
    pub fn add_step(&mut self, step: StepNode) -> EngineResult<NodeIndex> {
        if self.step_indices.contains_key(&step.agent_name) {
            return Err(EngineError::pipeline(format!(
                "Duplicate step: {}",
                step.agent_name
            )));
        }
        let agent_name = step.agent_name.clone();
        let index = self.graph.add_node(step);
        self.step_indices.insert(agent_name, index);
        Ok(index)
    }

    /// Add a dependency edge between steps
    pub fn add_dependency(
        &mut self,
        from_step: &str,
        to_step: &str,
        dependency_type: DependencyType,
    ) -> EngineResult<()> {
        let from_idx = self
            .step_indices
            .get(from_step)
            .ok_or_else(|| EngineError::pipeline(format!("Step not found: {}", from_step)))?;
        let to_idx = self
            .step_indices
            .get(to_step)
            .ok_or_else(|| EngineError::pipeline(format!("Step not found: {}", to_step)))?;

        self.graph
            .add_edge(*from_idx, *to_idx, DependencyEdge { dependency_type });
        Ok(())
    }

    /// Build and return the pipeline graph
    pub fn build(self) -> PipelineGraph {
        self.graph
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
