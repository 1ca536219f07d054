//! Typed input-schema table.
//!
//! The editor declares a schema entry per input field. The table is
//! resolved once per compile into a keyed lookup so the builder never
//! scans schema lists per input; a missing entry is a defined error, not
//! an index fault.

use crate::error::{GraphError, GraphResult};
use crate::payload::RawInputParam;
use std::collections::HashMap;
use weave_types::NodeId;

/// How one input value is classified during partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Plain runtime parameter.
    Text,
    /// Numeric-coerced runtime parameter (empty string becomes 0).
    Number,
    /// Credential; empty values default to `"NA"`.
    Credential,
}

/// Schema for one input field.
#[derive(Debug, Clone)]
pub struct InputSchema {
    pub kind: InputKind,
    /// Flagged as a request-time inference override.
    pub inference: bool,
}

/// Per-node schema lookup, built once from the payload declarations.
#[derive(Debug, Default)]
pub struct SchemaTable {
    entries: HashMap<String, InputSchema>,
}

impl SchemaTable {
    pub fn from_params(params: &[RawInputParam]) -> Self {
        let mut entries = HashMap::with_capacity(params.len());
        for p in params {
            let kind = match p.kind.as_str() {
                "number" => InputKind::Number,
                "credential" | "password" => InputKind::Credential,
                _ => InputKind::Text,
            };
            entries.insert(
                p.name.clone(),
                InputSchema {
                    kind,
                    inference: p.additional_params,
                },
            );
        }
        Self { entries }
    }

    /// Look up the schema for an input field of `node`.
    pub fn lookup(&self, node: &NodeId, field: &str) -> GraphResult<&InputSchema> {
        self.entries
            .get(field)
            .ok_or_else(|| GraphError::SchemaMismatch {
                node: node.clone(),
                field: field.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str, kind: &str, additional: bool) -> RawInputParam {
        RawInputParam {
            name: name.into(),
            kind: kind.into(),
            additional_params: additional,
        }
    }

    #[test]
    fn classifies_kinds() {
        let table = SchemaTable::from_params(&[
            param("temperature", "number", true),
            param("accessToken", "credential", false),
            param("modelName", "string", false),
        ]);
        let node = NodeId::new("llm_0");
        assert_eq!(table.lookup(&node, "temperature").unwrap().kind, InputKind::Number);
        assert!(table.lookup(&node, "temperature").unwrap().inference);
        assert_eq!(
            table.lookup(&node, "accessToken").unwrap().kind,
            InputKind::Credential
        );
        assert_eq!(table.lookup(&node, "modelName").unwrap().kind, InputKind::Text);
    }

    #[test]
    fn missing_entry_is_schema_mismatch() {
        let table = SchemaTable::from_params(&[]);
        let err = table.lookup(&NodeId::new("llm_0"), "topK").unwrap_err();
        match err {
            GraphError::SchemaMismatch { node, field } => {
                assert_eq!(node.as_str(), "llm_0");
                assert_eq!(field, "topK");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
