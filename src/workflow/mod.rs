//! WorkflowEngine - DAG validation, compilation and execution
//!
//! ## Responsibilities
//!
//! - validate: DAG over known node ids
//! - compile: deterministic topological order (ties by declaration order)
//! - execute: single pass over the compiled order, broadcast-marked nodes
//!   publish their result on the channel named after their type
//!
//! Execution is synchronous. Callers that need a deadline run it on a
//! blocking thread under a timeout.

mod graph;
mod handlers;
mod types;

pub use graph::{compile, validate};
pub use handlers::{NodeCategory, NodeKind};
pub use types::*;

use crate::error::{Error, Result};
use crate::realtime_hub::{HubMessage, RealtimeHub};
use handlers::{Handler, Inputs};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A node resolved to its handler
struct PlannedNode<'a> {
    spec: &'a NodeSpec,
    handler: Handler,
    is_source: bool,
}

/// Workflow executor
pub struct WorkflowEngine {
    hub: Arc<RealtimeHub>,
}

impl WorkflowEngine {
    pub fn new(hub: Arc<RealtimeHub>) -> Self {
        Self { hub }
    }

    pub fn validate(&self, definition: &WorkflowDefinition) -> Result<()> {
        validate(definition)
    }

    pub fn compile(&self, definition: &WorkflowDefinition) -> Result<Vec<String>> {
        compile(definition)
    }

    /// Resolve every node before anything runs
    fn plan<'a>(
        definition: &'a WorkflowDefinition,
        order: &[usize],
    ) -> Result<Vec<PlannedNode<'a>>> {
        let mut has_incoming = vec![false; definition.nodes.len()];
        let positions: HashMap<&str, usize> = definition
            .nodes
            .iter()
            .enumerate()
            .map(|(pos, n)| (n.id.as_str(), pos))
            .collect();
        for edge in &definition.edges {
            if let Some(pos) = positions.get(edge.target.as_str()) {
                has_incoming[*pos] = true;
            }
        }

        order
            .iter()
            .map(|pos| {
                let spec = &definition.nodes[*pos];
                let kind: NodeKind = spec.node_type.parse()?;
                let handler = kind.handler().ok_or_else(|| {
                    Error::NotImplemented(format!(
                        "node type {} (node {}) has no provider",
                        kind, spec.id
                    ))
                })?;
                Ok(PlannedNode {
                    spec,
                    handler,
                    is_source: !has_incoming[*pos],
                })
            })
            .collect()
    }

    /// Run the workflow once. `external` feeds nodes without predecessors.
    pub fn execute(
        &self,
        definition: &WorkflowDefinition,
        external: &Inputs,
    ) -> Result<WorkflowResult> {
        let order = graph::order_indices(definition)?;
        let plan = Self::plan(definition, &order)?;

        let mut outputs: HashMap<&str, Value> = HashMap::with_capacity(plan.len());
        let mut result = WorkflowResult::default();

        for node in &plan {
            let spec = node.spec;

            let mut inputs = Inputs::new();
            if node.is_source {
                inputs.extend(external.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            for edge in definition.edges.iter().filter(|e| e.target == spec.id) {
                if let Some(value) = outputs.get(edge.source.as_str()) {
                    inputs.insert(edge.input_key().to_string(), value.clone());
                }
            }
            inputs.extend(spec.config.iter().map(|(k, v)| (k.clone(), v.clone())));

            let output = (node.handler)(&inputs).map_err(|e| {
                tracing::warn!(
                    node_id = %spec.id,
                    node_type = %spec.node_type,
                    error = %e,
                    "Workflow node failed"
                );
                Error::WorkflowExecution {
                    node_id: spec.id.clone(),
                    message: e.to_string(),
                }
            })?;

            if spec.broadcast {
                let message = HubMessage::update(&spec.node_type, output.clone());
                result.deliveries += self.hub.broadcast(&spec.node_type, &message);
            }

            tracing::debug!(node_id = %spec.id, node_type = %spec.node_type, "Workflow node done");
            outputs.insert(spec.id.as_str(), output.clone());
            result.results.push(NodeResult {
                node_id: spec.id.clone(),
                node_type: spec.node_type.clone(),
                output,
            });
        }

        tracing::info!(nodes = result.len(), deliveries = result.deliveries, "Workflow executed");
        Ok(result)
    }
}
