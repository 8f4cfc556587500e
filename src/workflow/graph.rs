//! Graph validation and deterministic topological ordering

use super::types::WorkflowDefinition;
use crate::error::{Error, Result};
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};

/// Graph over node declaration indices
pub(crate) struct WorkflowGraph {
    pub(crate) inner: DiGraph<usize, usize>,
    pub(crate) index: HashMap<String, NodeIndex>,
}

pub(crate) fn build(definition: &WorkflowDefinition) -> Result<WorkflowGraph> {
    if definition.nodes.is_empty() {
        return Err(Error::Configuration(
            "workflow must contain at least one node".to_string(),
        ));
    }

    let mut inner = DiGraph::with_capacity(definition.nodes.len(), definition.edges.len());
    let mut index = HashMap::with_capacity(definition.nodes.len());

    for (pos, node) in definition.nodes.iter().enumerate() {
        if node.id.is_empty() {
            return Err(Error::Configuration(format!("node #{} has an empty id", pos)));
        }
        let idx = inner.add_node(pos);
        if index.insert(node.id.clone(), idx).is_some() {
            return Err(Error::Configuration(format!("duplicate node id '{}'", node.id)));
        }
    }

    for (pos, edge) in definition.edges.iter().enumerate() {
        let source = index.get(&edge.source).ok_or_else(|| {
            Error::Configuration(format!(
                "edge #{} references unknown source '{}'",
                pos, edge.source
            ))
        })?;
        let target = index.get(&edge.target).ok_or_else(|| {
            Error::Configuration(format!(
                "edge #{} references unknown target '{}'",
                pos, edge.target
            ))
        })?;
        if source == target {
            return Err(Error::Configuration(format!(
                "node '{}' is connected to itself",
                edge.source
            )));
        }
        inner.add_edge(*source, *target, pos);
    }

    if is_cyclic_directed(&inner) {
        return Err(Error::Configuration(
            "workflow configuration contains cycles".to_string(),
        ));
    }

    Ok(WorkflowGraph { inner, index })
}

/// Reject anything that is not a DAG over known node ids
pub fn validate(definition: &WorkflowDefinition) -> Result<()> {
    build(definition).map(|_| ())
}

/// Kahn's algorithm; among ready nodes the earliest declared goes first.
/// Returns declaration indices.
pub(crate) fn order_indices(definition: &WorkflowDefinition) -> Result<Vec<usize>> {
    let graph = build(definition)?;
    let g = &graph.inner;

    let mut in_degree: Vec<usize> = g
        .node_indices()
        .map(|n| g.neighbors_directed(n, Direction::Incoming).count())
        .collect();

    // NodeIndex i was added for declaration position i
    let mut ready: BTreeSet<usize> = (0..in_degree.len()).filter(|i| in_degree[*i] == 0).collect();
    let mut order = Vec::with_capacity(in_degree.len());

    while let Some(pos) = ready.pop_first() {
        order.push(pos);
        for succ in g.neighbors_directed(NodeIndex::new(pos), Direction::Outgoing) {
            let succ_pos = g[succ];
            in_degree[succ_pos] -= 1;
            if in_degree[succ_pos] == 0 {
                ready.insert(succ_pos);
            }
        }
    }

    if order.len() != definition.nodes.len() {
        return Err(Error::Configuration(
            "workflow configuration contains cycles".to_string(),
        ));
    }
    Ok(order)
}

/// Topological ordering of node ids
pub fn compile(definition: &WorkflowDefinition) -> Result<Vec<String>> {
    Ok(order_indices(definition)?
        .into_iter()
        .map(|pos| definition.nodes[pos].id.clone())
        .collect())
}
