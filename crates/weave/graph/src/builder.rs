//! DAG builder.
//!
//! Turns the raw editor payload into a compiled [`FlowGraph`]: anchor
//! references become edges, control nodes are classified into entry/exit
//! id lists, and every remaining input is partitioned into runtime,
//! inference, or dependent-infrastructure parameters according to its
//! declared schema.

use crate::error::{GraphError, GraphResult};
use crate::payload::{RawFlow, RawNode};
use crate::schema::{InputKind, SchemaTable};
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use tracing::{debug, instrument};
use weave_types::{FlowGraph, FlowId, Node, NodeCategory, NodeId, UiConfig};

/// Input key that selects a node's backend engine.
const ENGINE_INPUT: &str = "engine";

/// Engines that are externally hosted: nodes selecting one of these run
/// without any self-managed backing infrastructure.
const HOSTED_ENGINES: &[&str] = &["openai"];

/// Builds a [`FlowGraph`] from a raw editor payload.
pub struct GraphBuilder {
    anchor: Regex,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        // Anchor references name another node's produced output.
        let anchor = Regex::new(r"^\{\{(.+)\.output\}\}$").expect("static anchor pattern");
        Self { anchor }
    }

    /// Compile the payload into a resolved graph.
    #[instrument(skip(self, raw), fields(flow_id = %raw.id))]
    pub fn build(&self, raw: &RawFlow) -> GraphResult<FlowGraph> {
        let raw_nodes = raw.nodes()?;

        let mut nodes: Vec<Node> = Vec::with_capacity(raw_nodes.len());
        let mut index: HashMap<NodeId, usize> = HashMap::with_capacity(raw_nodes.len());
        let mut ui_config = UiConfig::default();
        let mut chat_input_ids = Vec::new();
        let mut chat_completion_ids = Vec::new();
        let mut doc_input_ids = Vec::new();

        for raw_node in &raw_nodes {
            let id = NodeId::new(raw_node.id.clone());
            if index.contains_key(&id) {
                return Err(GraphError::Structure(format!("duplicate node id {id}")));
            }

            let category = NodeCategory::parse(&raw_node.category);
            if category == NodeCategory::Controls {
                match raw_node.name.as_str() {
                    "chat_input" => {
                        ui_config.chat_input = true;
                        chat_input_ids.push(id.clone());
                    }
                    "doc_input" => {
                        ui_config.doc_input = true;
                        doc_input_ids.push(id.clone());
                    }
                    "chat_completion" => {
                        ui_config.chat_completion = true;
                        chat_completion_ids.push(id.clone());
                    }
                    _ => {}
                }
            }

            index.insert(id.clone(), nodes.len());
            nodes.push(Node {
                id,
                category,
                name: raw_node.name.clone(),
                params: BTreeMap::new(),
                inference_params: BTreeMap::new(),
                dependent_services: raw_node.dependent_services.clone(),
                connected_from: Vec::new(),
                connected_to: Vec::new(),
            });
        }

        // Resolve inputs: anchors become edges, everything else is
        // partitioned by its declared schema.
        let mut edges: Vec<(usize, usize)> = Vec::new();
        for raw_node in &raw_nodes {
            let node_idx = index[&NodeId::new(raw_node.id.clone())];
            let schema = SchemaTable::from_params(&raw_node.input_params);
            self.partition_inputs(raw_node, node_idx, &schema, &index, &mut nodes, &mut edges)?;
        }
        for (from, to) in edges {
            let to_id = nodes[to].id.clone();
            let from_id = nodes[from].id.clone();
            nodes[to].connected_from.push(from_id);
            nodes[from].connected_to.push(to_id);
        }

        let entry_ids: Vec<NodeId> = chat_input_ids
            .iter()
            .chain(doc_input_ids.iter())
            .cloned()
            .collect();
        let visit_order = bfs_order(&nodes, &index, &entry_ids);
        reject_cycles(&nodes, &index)?;

        debug!(
            node_count = nodes.len(),
            visited = visit_order.len(),
            "graph compiled"
        );

        Ok(FlowGraph {
            id: FlowId::new(raw.id.clone()),
            name: raw.name.clone(),
            nodes,
            ui_config,
            chat_input_ids,
            chat_completion_ids,
            doc_input_ids,
            visit_order,
        })
    }

    fn partition_inputs(
        &self,
        raw_node: &RawNode,
        node_idx: usize,
        schema: &SchemaTable,
        index: &HashMap<NodeId, usize>,
        nodes: &mut [Node],
        edges: &mut Vec<(usize, usize)>,
    ) -> GraphResult<()> {
        let engine = raw_node
            .inputs
            .get(ENGINE_INPUT)
            .and_then(|v| v.as_str())
            .map(str::to_string);

        // A hosted engine needs no self-managed backing services.
        if engine
            .as_deref()
            .is_some_and(|e| HOSTED_ENGINES.contains(&e))
        {
            nodes[node_idx].dependent_services.clear();
        } else if let Some(engine) = &engine {
            nodes[node_idx]
                .dependent_services
                .retain(|service_type, _| service_type == engine);
        }

        for (key, value) in &raw_node.inputs {
            if let Some(value_str) = value.as_str() {
                if let Some(captures) = self.anchor.captures(value_str) {
                    let reference = captures[1].to_string();
                    let from_idx = index.get(&NodeId::new(reference.clone())).copied().ok_or(
                        GraphError::DanglingReference {
                            node: nodes[node_idx].id.clone(),
                            reference,
                        },
                    )?;
                    edges.push((from_idx, node_idx));
                    continue;
                }
            }

            let entry = schema.lookup(&nodes[node_idx].id, key)?;
            let mut value = value.clone();
            match entry.kind {
                InputKind::Number => {
                    value = coerce_number(&value);
                }
                InputKind::Credential => {
                    if value.as_str().is_some_and(str::is_empty) {
                        value = serde_json::Value::String("NA".into());
                    }
                }
                InputKind::Text => {}
            }

            // Inputs owned by a surviving dependent-service bucket go to
            // that bucket instead of the runtime parameters.
            let node = &mut nodes[node_idx];
            let mut routed = false;
            for bucket in node.dependent_services.values_mut() {
                if bucket.contains_key(key) {
                    bucket.insert(key.clone(), value.clone());
                    routed = true;
                    break;
                }
            }
            if routed {
                continue;
            }

            if entry.inference {
                node.inference_params.insert(key.clone(), value.clone());
            }
            node.params.insert(key.clone(), value);
        }

        Ok(())
    }
}

/// Coerce an editor number field to a JSON number.
///
/// The editor sends numbers as strings; an empty field means "unset" and
/// becomes 0. Values that are already numeric pass through untouched.
fn coerce_number(value: &serde_json::Value) -> serde_json::Value {
    if value.is_number() {
        return value.clone();
    }
    let parsed = value
        .as_str()
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    serde_json::Number::from_f64(parsed)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::from(0))
}

/// Breadth-first visit order from the configured entry nodes.
///
/// A node already visited is not re-enqueued, which keeps the traversal
/// finite; genuine cycles are rejected separately by [`reject_cycles`].
fn bfs_order(nodes: &[Node], index: &HashMap<NodeId, usize>, entries: &[NodeId]) -> Vec<NodeId> {
    let mut order = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<NodeId> = entries.iter().cloned().collect();

    while let Some(id) = queue.pop_front() {
        if !visited.insert(id.clone()) {
            continue;
        }
        order.push(id.clone());
        if let Some(&idx) = index.get(&id) {
            for next in &nodes[idx].connected_to {
                if !visited.contains(next) {
                    queue.push_back(next.clone());
                }
            }
        }
    }
    order
}

/// Reject graphs whose resolved edges contain a cycle.
fn reject_cycles(nodes: &[Node], index: &HashMap<NodeId, usize>) -> GraphResult<()> {
    let mut in_degree: Vec<usize> = nodes.iter().map(|n| n.connected_from.len()).collect();
    let mut queue: VecDeque<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| i)
        .collect();
    let mut processed = 0usize;

    while let Some(idx) = queue.pop_front() {
        processed += 1;
        for next in &nodes[idx].connected_to {
            let next_idx = index[next];
            in_degree[next_idx] -= 1;
            if in_degree[next_idx] == 0 {
                queue.push_back(next_idx);
            }
        }
    }

    if processed < nodes.len() {
        let stuck = nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| in_degree[*i] > 0)
            .map(|(_, n)| n.id.as_str())
            .min()
            .unwrap_or("unknown");
        return Err(GraphError::Structure(format!(
            "cycle detected involving node {stuck}"
        )));
    }
    Ok(())
}
