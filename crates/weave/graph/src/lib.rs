//! Graph ingestion and DAG compilation for Weave.
//!
//! Consumes the raw node/edge payload the visual editor produces and
//! resolves it into a validated [`FlowGraph`](weave_types::FlowGraph):
//! anchor references become explicit edges, control nodes are classified
//! into entry/exit lists, and node inputs are partitioned into runtime,
//! inference, and dependent-infrastructure parameters.

#![deny(unsafe_code)]

pub mod builder;
pub mod error;
pub mod payload;
pub mod schema;

pub use builder::GraphBuilder;
pub use error::{GraphError, GraphResult};
pub use payload::{RawFlow, RawInputParam, RawNode};
pub use schema::{InputKind, InputSchema, SchemaTable};

use weave_types::FlowGraph;

/// Compile a raw editor payload into a resolved flow graph.
pub fn compile(raw: &RawFlow) -> GraphResult<FlowGraph> {
    GraphBuilder::new().build(raw)
}
