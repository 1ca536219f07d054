//! Weave Types - Core types for pipeline compilation and deployment
//!
//! Weave compiles a visual node/edge pipeline graph into a deployable
//! service topology and supervises the resulting deployment. This crate
//! holds the model shared by every stage:
//!
//! - **FlowGraph / Node**: the compiled pipeline graph
//! - **Topology / Service**: the deduplicated, port-assigned service map
//! - **DeployJob / StatusUpdate**: the deployment lifecycle and its
//!   status stream
//!
//! ## Architectural boundaries
//!
//! - `weave-graph` owns payload parsing and DAG building
//! - `weave-topology` owns service identity, dedup, and port allocation
//! - `weave-render` owns artifact generation
//! - `weave-deploy` / `weave-health` own the deployment lifecycle

#![deny(unsafe_code)]

pub mod graph;
pub mod ids;
pub mod remote;
pub mod service;
pub mod status;

pub use graph::{FlowGraph, Node, NodeCategory, UiConfig};
pub use ids::{FlowId, JobId, NodeId, ServiceId};
pub use remote::{RemoteAuth, RemoteTarget};
pub use service::{AppEntry, Service, ServiceKind, Topology, UiServiceConfig};
pub use status::{
    DeployJob, DeployStatus, ServiceState, ServiceStatus, StatusSnapshot, StatusUpdate,
    TransportKind, LOG_TAIL_LINES,
};
