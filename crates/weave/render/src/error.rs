//! Error types for weave-render.
//!
//! Render errors are fatal to the whole render; partial artifact sets are
//! never returned.

use thiserror::Error;
use weave_types::ServiceKind;

/// Errors raised while rendering deployment artifacts.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No built-in template exists for the service kind.
    #[error("no template registered for service kind {kind}")]
    TemplateNotFound { kind: ServiceKind },

    /// A `{field}` placeholder has no value in the service's bindings.
    #[error("template {template} has no binding for field {field}")]
    MissingBinding { template: String, field: String },

    /// A template or rendered document is not valid YAML.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Topology serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
