//! Deployment artifact rendering for Weave.
//!
//! Turns a compiled topology into the deployable text artifacts: a
//! compose document, a deployment manifest, an environment/port file, a
//! serialized topology copy, and a reverse-proxy fragment. Templates are
//! compiled into the binary; rendering applies a dynamic block pass and a
//! scalar substitution pass, in that order, and is byte-identical for the
//! same topology and environment.

#![deny(unsafe_code)]

pub mod artifacts;
pub mod dynamic;
pub mod env;
pub mod error;
pub mod registry;
pub mod scalar;

pub use artifacts::{
    Artifact, ArtifactSet, Renderer, COMPOSE_FILE, ENV_FILE_NAME, MANIFEST_FILE, PROXY_FILE,
    TOPOLOGY_FILE,
};
pub use env::RenderEnv;
pub use error::{RenderError, RenderResult};
pub use registry::{TemplateHandle, TemplateRegistry};

use weave_types::Topology;

/// Render the full artifact set under the given environment.
pub fn render_artifacts(topology: &Topology, env: RenderEnv) -> RenderResult<ArtifactSet> {
    Renderer::new(env).render_artifacts(topology)
}
