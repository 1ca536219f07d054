//! Compiled pipeline graph model.
//!
//! A [`FlowGraph`] is the output of the graph compiler: every node has its
//! edges resolved, its inputs partitioned into runtime parameters,
//! inference parameters, and dependent-service parameters, and the control
//! nodes classified into entry/exit id lists. The graph is owned by one
//! compile pass and immutable once returned.

use crate::ids::{FlowId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Editor-assigned category of a pipeline node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    Controls,
    Llm,
    Embeddings,
    Retriever,
    Reranking,
    DataPrep,
    Agents,
    Other(String),
}

impl NodeCategory {
    pub fn parse(s: &str) -> Self {
        match s {
            "Controls" => Self::Controls,
            "LLM" => Self::Llm,
            "Embeddings" => Self::Embeddings,
            "Retriever" => Self::Retriever,
            "Reranking" => Self::Reranking,
            "DataPrep" => Self::DataPrep,
            "Agents" => Self::Agents,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One compiled pipeline unit.
///
/// `params` holds plain runtime parameters, `inference_params` the subset
/// flagged as request-time overrides, and `dependent_services` the
/// parameters routed to backing infrastructure (keyed by infra service
/// type, e.g. `textgen_server`). Edges are stored on both endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub category: NodeCategory,
    /// Service template identity, e.g. `svc@llm` or `chat_input`.
    pub name: String,
    pub params: BTreeMap<String, serde_json::Value>,
    pub inference_params: BTreeMap<String, serde_json::Value>,
    pub dependent_services: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    pub connected_from: Vec<NodeId>,
    pub connected_to: Vec<NodeId>,
}

impl Node {
    /// Whether this node projects 1:1 onto a pipeline service.
    pub fn is_pipeline_service(&self) -> bool {
        self.name.starts_with("svc@")
    }
}

/// Which control surfaces the flow exposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiConfig {
    pub chat_input: bool,
    pub chat_completion: bool,
    pub doc_input: bool,
}

/// A fully compiled pipeline graph.
///
/// Nodes are kept in payload order; all derived collections iterate in
/// that order so a recompile of the same payload is byte-identical
/// downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowGraph {
    pub id: FlowId,
    pub name: String,
    pub nodes: Vec<Node>,
    pub ui_config: UiConfig,
    pub chat_input_ids: Vec<NodeId>,
    pub chat_completion_ids: Vec<NodeId>,
    pub doc_input_ids: Vec<NodeId>,
    /// BFS visit order from the entry nodes.
    pub visit_order: Vec<NodeId>,
}

impl FlowGraph {
    /// Look up a node by id.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Nodes that project onto pipeline services, in payload order.
    pub fn pipeline_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_pipeline_service())
    }

    /// Serialize the graph for embedding into deployment artifacts.
    ///
    /// Keys are emitted in stable order so re-serialization of the same
    /// graph is byte-identical.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, name: &str) -> Node {
        Node {
            id: NodeId::new(id),
            category: NodeCategory::Llm,
            name: name.to_string(),
            params: BTreeMap::new(),
            inference_params: BTreeMap::new(),
            dependent_services: BTreeMap::new(),
            connected_from: vec![],
            connected_to: vec![],
        }
    }

    #[test]
    fn pipeline_nodes_filter_controls() {
        let graph = FlowGraph {
            id: FlowId::new("flow-1"),
            name: "test".into(),
            nodes: vec![node("a", "chat_input"), node("b", "svc@llm")],
            ui_config: UiConfig::default(),
            chat_input_ids: vec![NodeId::new("a")],
            chat_completion_ids: vec![],
            doc_input_ids: vec![],
            visit_order: vec![],
        };
        let pipeline: Vec<_> = graph.pipeline_nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(pipeline, vec!["b"]);
    }

    #[test]
    fn json_export_is_stable() {
        let graph = FlowGraph {
            id: FlowId::new("flow-1"),
            name: "test".into(),
            nodes: vec![node("a", "svc@llm")],
            ui_config: UiConfig::default(),
            chat_input_ids: vec![],
            chat_completion_ids: vec![],
            doc_input_ids: vec![],
            visit_order: vec![],
        };
        assert_eq!(
            graph.to_pretty_json().unwrap(),
            graph.to_pretty_json().unwrap()
        );
    }
}
