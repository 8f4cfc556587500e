//! Workflow definition and result types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node as declared by the workflow builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Publish this node's result on the channel named after its type
    #[serde(default)]
    pub broadcast: bool,
}

/// Directed connection between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSpec {
    pub source: String,
    /// Name under which the source output reaches the target (defaults to the source id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    pub target: String,
}

impl EdgeSpec {
    pub fn input_key(&self) -> &str {
        self.source_handle.as_deref().unwrap_or(&self.source)
    }
}

/// Nodes + edges; must form a DAG
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

/// One node's output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    pub node_id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub output: Value,
}

/// Outputs of one execution, in execution order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowResult {
    pub results: Vec<NodeResult>,
    /// Total subscribers reached by broadcast nodes
    pub deliveries: usize,
}

impl WorkflowResult {
    pub fn get(&self, node_id: &str) -> Option<&Value> {
        self.results
            .iter()
            .find(|r| r.node_id == node_id)
            .map(|r| &r.output)
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.node_id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
