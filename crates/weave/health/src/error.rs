//! Error types for weave-health.
//!
//! Classification errors are terminal for the deployment they belong to
//! and always enumerate the affected service names.

use thiserror::Error;

/// Errors raised while supervising a deployment.
#[derive(Debug, Error)]
pub enum HealthError {
    /// A service outside the run-to-completion allow-list exited.
    #[error("services exited unexpectedly: {}", services.join(", "))]
    UnexpectedExit { services: Vec<String> },

    /// A health probe reported a service unhealthy.
    #[error("services unhealthy: {}", services.join(", "))]
    Unhealthy { services: Vec<String> },

    /// The confirmatory poll found services in a restart loop.
    #[error("services restarting: {}", services.join(", "))]
    RestartLoop { services: Vec<String> },

    /// The status probe itself failed.
    #[error("status probe failed: {0}")]
    Probe(String),
}

impl From<ssh2::Error> for HealthError {
    fn from(err: ssh2::Error) -> Self {
        Self::Probe(err.to_string())
    }
}

impl From<std::io::Error> for HealthError {
    fn from(err: std::io::Error) -> Self {
        Self::Probe(err.to_string())
    }
}

/// Result type for health operations.
pub type HealthResult<T> = Result<T, HealthError>;
