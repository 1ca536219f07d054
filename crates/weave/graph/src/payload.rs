//! Raw editor payload types.
//!
//! This is the node/edge document the visual editor produces. Connections
//! are not explicit edges: they are anchor-reference strings embedded in
//! node inputs (`{{<node-id>.output}}`), resolved by the builder.

use crate::error::{GraphError, GraphResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level editor document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFlow {
    pub id: String,
    pub name: String,
    #[serde(rename = "flowData")]
    pub flow_data: serde_json::Value,
}

/// One node as declared by the editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Raw key→value editor fields, anchor references included.
    #[serde(default)]
    pub inputs: BTreeMap<String, serde_json::Value>,
    /// Declared schema entries for the inputs.
    #[serde(rename = "inputParams", default)]
    pub input_params: Vec<RawInputParam>,
    /// Dependent-infrastructure parameter buckets, keyed by infra
    /// service type; values are the parameter subset each bucket owns.
    #[serde(rename = "dependentServices", alias = "dependent_services", default)]
    pub dependent_services: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

/// Declared schema for one input field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInputParam {
    pub name: String,
    /// Value kind: `string`, `number`, `credential`, `options`, ...
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Marks request-time inference overrides.
    #[serde(rename = "additionalParams", default)]
    pub additional_params: bool,
}

impl RawFlow {
    /// Extract the node list, or report the structural failure.
    pub fn nodes(&self) -> GraphResult<Vec<RawNode>> {
        let nodes = self
            .flow_data
            .get("nodes")
            .ok_or_else(|| GraphError::Structure("nodes not found in flow data".into()))?;
        serde_json::from_value(nodes.clone())
            .map_err(|e| GraphError::Structure(format!("invalid node entry: {e}")))
    }
}
