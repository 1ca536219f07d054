//! Service registry and port allocation for Weave.
//!
//! Projects a compiled flow graph into the immutable service
//! [`Topology`](weave_types::Topology): pipeline services, deduplicated
//! model servers, vector stores with well-known ports, type-prefixed
//! cross-links, and the synthesized `app` entry.

#![deny(unsafe_code)]

pub mod builder;
pub mod ports;

pub use builder::{ui_route, TopologyBuilder};
pub use ports::{PortAllocator, DYNAMIC_PORT_BASE, VECTOR_DATA_PORT_BASE, VECTOR_INSIGHT_PORT_BASE};

use weave_types::{FlowGraph, Topology};

/// Compile a flow graph into its service topology.
pub fn build_topology(graph: &FlowGraph) -> Topology {
    TopologyBuilder::new().build(graph)
}
