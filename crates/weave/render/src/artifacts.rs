//! Artifact assembly.
//!
//! Renders the full artifact set for a compiled topology: compose
//! document, deployment manifest, environment/port file, topology copy,
//! and the reverse-proxy fragment. Rendering aborts on the first error;
//! partial sets are never returned.

use crate::dynamic::DynamicBlocks;
use crate::env::RenderEnv;
use crate::error::RenderResult;
use crate::registry::{TemplateRegistry, ENV_FILE, PROXY_CONF};
use crate::scalar::{substitute_str, substitute_value, Bindings};
use tracing::{debug, instrument};
use weave_types::{Service, ServiceKind, Topology};

pub const MANIFEST_FILE: &str = "manifest.yaml";
pub const COMPOSE_FILE: &str = "compose.yaml";
pub const ENV_FILE_NAME: &str = ".env";
pub const TOPOLOGY_FILE: &str = "topology.json";
pub const PROXY_FILE: &str = "app.proxy.conf";

/// One rendered deployment file.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub content: String,
}

/// The complete rendered output for one topology.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    pub files: Vec<Artifact>,
}

impl ArtifactSet {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.content.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.name.as_str()).collect()
    }

    fn push(&mut self, name: &str, content: String) {
        self.files.push(Artifact {
            name: name.to_string(),
            content,
        });
    }
}

/// Renders deployment artifacts from a compiled topology.
pub struct Renderer {
    registry: TemplateRegistry,
    env: RenderEnv,
}

impl Renderer {
    pub fn new(env: RenderEnv) -> Self {
        Self {
            registry: TemplateRegistry::builtin(),
            env,
        }
    }

    /// Render every artifact for the topology.
    #[instrument(skip(self, topology), fields(flow_id = %topology.flow_id))]
    pub fn render_artifacts(&self, topology: &Topology) -> RenderResult<ArtifactSet> {
        let blocks = DynamicBlocks::new(topology, &self.env)?;

        let mut set = ArtifactSet::default();
        set.push(MANIFEST_FILE, self.render_manifest(topology, &blocks)?);
        set.push(COMPOSE_FILE, self.render_compose(topology, &blocks)?);
        set.push(ENV_FILE_NAME, self.render_env_file(&blocks)?);
        set.push(TOPOLOGY_FILE, topology.to_pretty_json()?);
        set.push(PROXY_FILE, blocks.expand(PROXY_CONF));

        debug!(files = set.files.len(), "artifacts rendered");
        Ok(set)
    }

    /// Compose document: one merged `services` mapping, app entry last.
    pub fn render_compose(
        &self,
        topology: &Topology,
        blocks: &DynamicBlocks,
    ) -> RenderResult<String> {
        let mut services = serde_yaml::Mapping::new();
        for service in &topology.services {
            let handle = self.registry.get(&service.kind)?;
            let text = blocks.expand(handle.compose);
            let fragment = substitute_value(handle.name, &text, &self.bindings(service))?;
            if let serde_yaml::Value::Mapping(fragment) = fragment {
                for (k, v) in fragment {
                    services.insert(k, v);
                }
            }
        }

        let app = self.registry.get(&ServiceKind::App)?;
        let text = blocks.expand(app.compose);
        let fragment = substitute_value(app.name, &text, &self.env_bindings())?;
        if let serde_yaml::Value::Mapping(fragment) = fragment {
            for (k, v) in fragment {
                services.insert(k, v);
            }
        }

        let mut root = serde_yaml::Mapping::new();
        root.insert(
            serde_yaml::Value::String("services".to_string()),
            serde_yaml::Value::Mapping(services),
        );
        Ok(serde_yaml::to_string(&serde_yaml::Value::Mapping(root))?)
    }

    /// Deployment manifest: all service documents concatenated, app
    /// documents last.
    pub fn render_manifest(
        &self,
        topology: &Topology,
        blocks: &DynamicBlocks,
    ) -> RenderResult<String> {
        let mut docs = Vec::new();
        for service in &topology.services {
            let handle = self.registry.get(&service.kind)?;
            let text = blocks.expand(handle.manifest);
            let bindings = self.bindings(service);
            for doc in text.split("\n---\n") {
                let value = substitute_value(handle.name, doc, &bindings)?;
                docs.push(serde_yaml::to_string(&value)?);
            }
        }

        let app = self.registry.get(&ServiceKind::App)?;
        let text = blocks.expand(app.manifest);
        let bindings = self.env_bindings();
        for doc in text.split("\n---\n") {
            let value = substitute_value(app.name, doc, &bindings)?;
            docs.push(serde_yaml::to_string(&value)?);
        }

        Ok(docs.join("---\n"))
    }

    /// Environment/port file for the compose path.
    pub fn render_env_file(&self, blocks: &DynamicBlocks) -> RenderResult<String> {
        let text = blocks.expand(ENV_FILE);
        substitute_str("env", &text, &self.env_bindings())
    }

    fn env_bindings(&self) -> Bindings {
        let mut bindings = Bindings::new();
        bindings.insert("registry".to_string(), self.env.registry.clone());
        bindings.insert("tag".to_string(), self.env.tag.clone());
        bindings.insert("http_proxy".to_string(), self.env.http_proxy.clone());
        bindings.insert("https_proxy".to_string(), self.env.https_proxy.clone());
        bindings.insert("no_proxy".to_string(), self.env.no_proxy.clone());
        bindings
    }

    fn bindings(&self, service: &Service) -> Bindings {
        let mut bindings = self.env_bindings();
        bindings.insert(
            "service_id".to_string(),
            service.service_id.as_str().to_string(),
        );
        bindings.insert("endpoint".to_string(), service.endpoint.clone());
        bindings.insert("port".to_string(), service.port.to_string());
        if let Some(insight) = service.port_insight {
            bindings.insert("port_insight".to_string(), insight.to_string());
        }
        for (key, value) in &service.params {
            bindings.insert(key.clone(), scalar_string(value));
        }
        bindings
    }
}

fn scalar_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
