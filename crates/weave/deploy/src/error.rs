//! Error types for weave-deploy.
//!
//! Connectivity and extraction failures are fatal for the job; an
//! unsupported document kind is recorded per document and never aborts
//! the batch.

use thiserror::Error;

/// Errors raised while deploying artifacts to a target.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The target is unreachable; the job goes directly to Error.
    #[error("cannot reach target: {0}")]
    Connectivity(String),

    /// The uploaded archive could not be extracted on the target.
    #[error("archive extraction failed on target: {0}")]
    Extraction(String),

    /// A manifest document declares a kind the control plane cannot
    /// apply.
    #[error("unsupported document kind {kind} for {name}")]
    UnsupportedKind { kind: String, name: String },

    /// A required artifact is missing from the rendered set.
    #[error("artifact {name} missing from bundle")]
    MissingArtifact { name: String },

    /// Control-plane API failure that is not a connectivity loss.
    #[error("control plane error: {0}")]
    Api(String),

    #[error("ssh error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for deploy operations.
pub type DeployResult<T> = Result<T, DeployError>;
