//! Deployment orchestration for Weave.
//!
//! Takes a rendered artifact set and starts it on a target over one of
//! two transports with the same external contract: apply, start, report
//! a job handle and a status stream.
//!
//! - **Remote host**: artifacts are packed into an archive, transferred
//!   over ssh, extracted, and started with a detached compose command.
//! - **Control plane**: manifest documents are applied per-kind through
//!   the cluster API inside an idempotently-created namespace.
//!
//! Supervision after start is owned by `weave-health`; the orchestrator
//! wires the matching probe into the watcher and forwards its updates.

#![deny(unsafe_code)]

pub mod bundle;
pub mod control_plane;
pub mod error;
pub mod orchestrator;
pub mod remote;

pub use bundle::{Bundle, ARCHIVE_NAME};
pub use control_plane::{
    apply_manifest, ApplyOutcome, ApplyRecord, ControlPlaneApi, ControlPlaneProbe,
    HttpControlPlane, InMemoryControlPlane, SUPPORTED_KINDS,
};
pub use error::{DeployError, DeployResult};
pub use orchestrator::{JobHandle, Orchestrator};
pub use remote::RemoteTransport;
