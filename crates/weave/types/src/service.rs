//! Compiled service topology model.
//!
//! A [`Topology`] is the immutable output of the service registry: every
//! pipeline node that must run in the workflow becomes a [`Service`],
//! shared infrastructure (model servers, vector stores) is deduplicated
//! into single entries, and a synthesized `app` entry aggregates the
//! cross-cutting wiring the renderer and the front end need.

use crate::ids::{FlowId, ServiceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The deployable service types Weave knows how to render.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceKind {
    /// Shared vector store (always singleton per instance index).
    VectorStore,
    /// Embedding / reranking model server.
    EmbedServer,
    /// Text-generation model server.
    TextGenServer,
    /// Document ingestion pipeline service.
    DataPrep,
    /// Embedding pipeline service.
    Embedding,
    /// Retrieval pipeline service.
    Retriever,
    /// Reranking pipeline service.
    Reranking,
    /// LLM chat pipeline service.
    LlmChat,
    /// Synthesized cross-cutting entry.
    App,
    /// Unknown template identity (renders as TemplateNotFound).
    Other(String),
}

impl ServiceKind {
    /// Parse a service-type string as produced by the editor or registry.
    pub fn parse(s: &str) -> Self {
        match s {
            "vector_store" => Self::VectorStore,
            "embed_server" => Self::EmbedServer,
            "textgen_server" => Self::TextGenServer,
            "svc@dataprep" => Self::DataPrep,
            "svc@embedding" => Self::Embedding,
            "svc@retriever" => Self::Retriever,
            "svc@reranking" => Self::Reranking,
            "svc@llm" => Self::LlmChat,
            "app" => Self::App,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::VectorStore => "vector_store",
            Self::EmbedServer => "embed_server",
            Self::TextGenServer => "textgen_server",
            Self::DataPrep => "svc@dataprep",
            Self::Embedding => "svc@embedding",
            Self::Retriever => "svc@retriever",
            Self::Reranking => "svc@reranking",
            Self::LlmChat => "svc@llm",
            Self::App => "app",
            Self::Other(s) => s,
        }
    }

    /// Whether this kind is a 1:1 projection of a pipeline node.
    pub fn is_pipeline(&self) -> bool {
        matches!(
            self,
            Self::DataPrep | Self::Embedding | Self::Retriever | Self::Reranking | Self::LlmChat
        )
    }

    /// Whether this kind is shared dependent infrastructure.
    pub fn is_dependent_infra(&self) -> bool {
        matches!(self, Self::VectorStore | Self::EmbedServer | Self::TextGenServer)
    }

    /// The key prefix used for cross-links on peer services, e.g.
    /// `textgen_server_endpoint`.
    pub fn link_prefix(&self) -> String {
        self.as_str().replace("svc@", "")
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One deployable unit in the compiled topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub service_id: ServiceId,
    pub kind: ServiceKind,
    /// DNS-safe endpoint name, e.g. `textgen-server-0`.
    pub endpoint: String,
    pub port: u16,
    /// Secondary UI/inspection port (vector stores only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_insight: Option<u16>,
    /// Template parameter bag: model/credential parameters plus
    /// type-prefixed cross-links to peer services.
    pub params: BTreeMap<String, serde_json::Value>,
    /// Services this one needs at start-up.
    pub dependent_service_refs: Vec<ServiceId>,
}

impl Service {
    /// Insert a string parameter.
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params
            .insert(key.into(), serde_json::Value::String(value.into()));
    }

    /// Insert a numeric parameter.
    pub fn set_param_num(&mut self, key: impl Into<String>, value: u16) {
        self.params.insert(key.into(), serde_json::Value::from(value));
    }
}

/// Per-service UI wiring exposed through the `app` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiServiceConfig {
    /// HTTP path the front end calls, e.g. `/v1/retrieval`.
    pub endpoint_path: String,
    pub port: u16,
    /// Environment-variable name the front end reads for this service.
    pub url_name: String,
}

/// The synthesized cross-cutting `app` entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppEntry {
    /// Every service endpoint, for reverse-proxy and routing config.
    pub endpoint_list: Vec<String>,
    /// Keyed by pipeline-service endpoint name.
    pub ui_config_info: BTreeMap<String, UiServiceConfig>,
    /// Port table for direct export as deployment environment variables,
    /// keyed by env-var name (`<SERVICE_ID>_PORT`).
    pub ports_info: BTreeMap<String, u16>,
    /// Front-end surface selected on the chat-completion node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_mode: Option<String>,
}

/// The complete compiled topology for one flow.
///
/// Created once per compile, immutable once returned. Services are kept
/// in allocation order; iteration order is part of the determinism
/// contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    pub flow_id: FlowId,
    pub services: Vec<Service>,
    pub app: AppEntry,
}

impl Topology {
    /// Look up a service by id.
    pub fn service(&self, id: &ServiceId) -> Option<&Service> {
        self.services.iter().find(|s| &s.service_id == id)
    }

    /// Look up a service by endpoint name.
    pub fn service_by_endpoint(&self, endpoint: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.endpoint == endpoint)
    }

    /// All allocated ports, in service order (insight ports included).
    pub fn ports(&self) -> Vec<u16> {
        let mut ports = Vec::new();
        for s in &self.services {
            ports.push(s.port);
            if let Some(p) = s.port_insight {
                ports.push(p);
            }
        }
        ports
    }

    /// Serialize for the `topology.json` artifact.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
