//! Error types for weave-graph.
//!
//! All compile-time graph errors are fatal and non-retryable; each names
//! the offending node or field so the editor can surface it.

use thiserror::Error;
use weave_types::NodeId;

/// Errors raised while building the DAG from an editor payload.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The payload is structurally invalid (missing `nodes`, duplicate
    /// node ids, or a cycle in the declared edges).
    #[error("invalid graph structure: {0}")]
    Structure(String),

    /// An anchor reference points at a node id that does not exist.
    #[error("node {node} references nonexistent node {reference}")]
    DanglingReference { node: NodeId, reference: String },

    /// An input has no declared schema entry.
    #[error("node {node} has no schema entry for input {field}")]
    SchemaMismatch { node: NodeId, field: String },
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;
