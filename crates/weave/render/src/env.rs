//! Render-time environment configuration.
//!
//! Registry, tag, proxies, and application images are injected from the
//! process environment, read once per render and never re-validated.

/// Externally injected configuration for one render pass.
#[derive(Debug, Clone)]
pub struct RenderEnv {
    /// Container image registry prefix.
    pub registry: String,
    /// Image tag applied to every pipeline image.
    pub tag: String,
    pub http_proxy: String,
    pub https_proxy: String,
    pub no_proxy: String,
    /// Front-end application image.
    pub frontend_image: String,
    /// Back-end gateway image.
    pub backend_image: String,
    /// Telemetry collector endpoint, when one is configured.
    pub telemetry_endpoint: Option<String>,
}

impl Default for RenderEnv {
    fn default() -> Self {
        Self {
            registry: "docker.io/weave".to_string(),
            tag: "latest".to_string(),
            http_proxy: String::new(),
            https_proxy: String::new(),
            no_proxy: String::new(),
            frontend_image: "docker.io/weave/app-frontend:latest".to_string(),
            backend_image: "docker.io/weave/app-backend:latest".to_string(),
            telemetry_endpoint: None,
        }
    }
}

impl RenderEnv {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str, fallback: String| std::env::var(name).unwrap_or(fallback);
        Self {
            registry: var("REGISTRY", defaults.registry),
            tag: var("TAG", defaults.tag),
            http_proxy: var("HTTP_PROXY", defaults.http_proxy),
            https_proxy: var("HTTPS_PROXY", defaults.https_proxy),
            no_proxy: var("NO_PROXY", defaults.no_proxy),
            frontend_image: var("FRONTEND_IMAGE", defaults.frontend_image),
            backend_image: var("BACKEND_IMAGE", defaults.backend_image),
            telemetry_endpoint: std::env::var("TELEMETRY_ENDPOINT").ok(),
        }
    }
}
