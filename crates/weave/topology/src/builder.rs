//! Service registry.
//!
//! Projects a compiled [`FlowGraph`] into the immutable [`Topology`]:
//! pipeline nodes become services 1:1, dependent model servers are
//! deduplicated by identity key, vector stores are discovered from edge
//! references, and every service records type-prefixed cross-links to the
//! peers it talks to so the renderer never re-derives the graph.

use crate::ports::PortAllocator;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument};
use weave_types::{
    AppEntry, FlowGraph, Node, Service, ServiceId, ServiceKind, Topology, UiServiceConfig,
};

/// Node name marking a vector-store instance on the canvas.
const VECTOR_STORE_NODE: &str = "vector_store";

/// Bucket key carrying the model identifier.
const MODEL_NAME_KEY: &str = "modelName";

/// Bucket key carrying the model-access credential.
const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Endpoint substituted for a hosted text-generation engine.
const HOSTED_TEXTGEN_ENDPOINT: &str = "https://api.openai.com";
const HOSTED_TEXTGEN_PORT: u16 = 443;

/// HTTP path and front-end env-var name for a pipeline service kind.
pub fn ui_route(kind: &ServiceKind) -> Option<(&'static str, &'static str)> {
    match kind {
        ServiceKind::DataPrep => Some(("/v1/dataprep", "APP_DATAPREP_URL")),
        ServiceKind::Embedding => Some(("/v1/embeddings", "APP_EMBEDDING_URL")),
        ServiceKind::Retriever => Some(("/v1/retrieval", "APP_RETRIEVAL_URL")),
        ServiceKind::Reranking => Some(("/v1/reranking", "APP_RERANKING_URL")),
        ServiceKind::LlmChat => Some(("/v1/chat/completions", "APP_CHAT_URL")),
        _ => None,
    }
}

fn hyphenate(id: &str) -> String {
    id.replace('_', "-")
}

/// Builds a [`Topology`] from a compiled graph.
///
/// One builder instance serves one compile pass; the port allocator and
/// dedup tables it owns are dropped with it.
#[derive(Default)]
pub struct TopologyBuilder {
    alloc: PortAllocator,
    services: Vec<Service>,
    index: HashMap<ServiceId, usize>,
    /// (service type, model, credential) → existing model server.
    dedup: HashMap<(String, String, String), ServiceId>,
    /// Per-type instance counters for model-server ids.
    type_counters: HashMap<String, u32>,
    /// Vector-store instance index → service id.
    vector_instances: BTreeMap<u16, ServiceId>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile the graph into a service topology.
    ///
    /// Deterministic: nodes are processed in payload order and every
    /// derived map is ordered, so the same graph always yields the same
    /// ids, ports, and endpoints.
    #[instrument(skip(self, graph), fields(flow_id = %graph.id))]
    pub fn build(mut self, graph: &FlowGraph) -> Topology {
        // 1. Pipeline services project 1:1 from svc@ nodes.
        for node in graph.pipeline_nodes() {
            let service_id = ServiceId::new(node.id.as_str());
            let port = self.alloc.next_dynamic();
            self.push(Service {
                service_id,
                kind: ServiceKind::parse(&node.name),
                endpoint: hyphenate(node.id.as_str()),
                port,
                port_insight: None,
                params: node.params.clone(),
                dependent_service_refs: Vec::new(),
            });
        }

        // 2. Dependent infrastructure and cross-links.
        for node in graph.pipeline_nodes() {
            let owner = ServiceId::new(node.id.as_str());

            // An LLM node without a surviving engine bucket runs against a
            // hosted endpoint; record the connection under the same keys a
            // self-managed server would use.
            if ServiceKind::parse(&node.name) == ServiceKind::LlmChat
                && node.dependent_services.is_empty()
            {
                self.link_hosted_engine(&owner, node);
            }

            for (service_type, bucket) in &node.dependent_services {
                let dep_id = self.ensure_model_server(service_type, bucket);
                self.link(&owner, &dep_id);
            }
            for peer_id in node.connected_from.iter().chain(node.connected_to.iter()) {
                let Some(peer) = graph.node(peer_id) else {
                    continue;
                };
                if peer.name == VECTOR_STORE_NODE {
                    let dep_id = self.ensure_vector_store(peer);
                    self.link(&owner, &dep_id);
                } else if peer.is_pipeline_service() {
                    let dep_id = ServiceId::new(peer.id.as_str());
                    self.link(&owner, &dep_id);
                }
            }
        }

        // 3. Synthesized app entry.
        let mut app = AppEntry::default();
        app.ui_mode = graph
            .chat_completion_ids
            .first()
            .and_then(|id| graph.node(id))
            .and_then(|node| node.params.get("ui_choice"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        for service in &self.services {
            app.endpoint_list.push(service.endpoint.clone());
            app.ports_info.insert(
                format!("{}_PORT", service.service_id.as_str().to_uppercase()),
                service.port,
            );
            if let Some(insight) = service.port_insight {
                app.ports_info.insert(
                    format!("{}_INSIGHT_PORT", service.service_id.as_str().to_uppercase()),
                    insight,
                );
            }
            if let Some((path, url_name)) = ui_route(&service.kind) {
                app.ui_config_info.insert(
                    service.endpoint.clone(),
                    UiServiceConfig {
                        endpoint_path: path.to_string(),
                        port: service.port,
                        url_name: url_name.to_string(),
                    },
                );
            }
        }

        debug!(services = self.services.len(), "topology compiled");
        Topology {
            flow_id: graph.id.clone(),
            services: self.services,
            app,
        }
    }

    fn push(&mut self, service: Service) {
        self.index
            .insert(service.service_id.clone(), self.services.len());
        self.services.push(service);
    }

    /// Allocate a model server for the bucket, or reuse the existing one
    /// when the identity key (model, credential) was already seen.
    fn ensure_model_server(
        &mut self,
        service_type: &str,
        bucket: &BTreeMap<String, serde_json::Value>,
    ) -> ServiceId {
        let model = bucket
            .get(MODEL_NAME_KEY)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let token = bucket
            .get(ACCESS_TOKEN_KEY)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let key = (service_type.to_string(), model, token);

        if let Some(existing) = self.dedup.get(&key) {
            return existing.clone();
        }

        let instance = self.type_counters.entry(service_type.to_string()).or_insert(0);
        let raw_id = format!("{service_type}_{instance}");
        *instance += 1;

        let service_id = ServiceId::new(&raw_id);
        let port = self.alloc.next_dynamic();
        self.push(Service {
            service_id: service_id.clone(),
            kind: ServiceKind::parse(service_type),
            endpoint: hyphenate(&raw_id),
            port,
            port_insight: None,
            params: bucket.clone(),
            dependent_service_refs: Vec::new(),
        });
        self.dedup.insert(key, service_id.clone());
        service_id
    }

    /// Register the vector-store instance a canvas node refers to, keyed
    /// by the numeric suffix of the node id.
    fn ensure_vector_store(&mut self, node: &Node) -> ServiceId {
        let instance: u16 = node
            .id
            .as_str()
            .rsplit('_')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        if let Some(existing) = self.vector_instances.get(&instance) {
            return existing.clone();
        }

        let service_id = ServiceId::new(node.id.as_str());
        self.push(Service {
            service_id: service_id.clone(),
            kind: ServiceKind::VectorStore,
            endpoint: hyphenate(node.id.as_str()),
            port: PortAllocator::vector_data(instance),
            port_insight: Some(PortAllocator::vector_insight(instance)),
            params: node.params.clone(),
            dependent_service_refs: Vec::new(),
        });
        self.vector_instances.insert(instance, service_id.clone());
        service_id
    }

    /// Point an LLM service at a hosted text-generation endpoint.
    fn link_hosted_engine(&mut self, owner: &ServiceId, node: &Node) {
        let prefix = ServiceKind::TextGenServer.link_prefix();
        let model = node.params.get(MODEL_NAME_KEY).cloned();
        let token = node.params.get(ACCESS_TOKEN_KEY).cloned();

        let owner_idx = self.index[owner];
        let service = &mut self.services[owner_idx];
        service.set_param(format!("{prefix}_endpoint"), HOSTED_TEXTGEN_ENDPOINT);
        service.set_param_num(format!("{prefix}_port"), HOSTED_TEXTGEN_PORT);
        if let Some(model) = model {
            service.params.insert(format!("{prefix}_model_name"), model);
        }
        if let Some(token) = token {
            service
                .params
                .insert(format!("{prefix}_access_token"), token);
        }
    }

    /// Record the cross-link from `owner` to `dep` under type-prefixed
    /// keys, so connection strings render without re-deriving the graph.
    fn link(&mut self, owner: &ServiceId, dep: &ServiceId) {
        let dep_idx = self.index[dep];
        let prefix = self.services[dep_idx].kind.link_prefix();
        let endpoint = self.services[dep_idx].endpoint.clone();
        let port = self.services[dep_idx].port;
        let model = self.services[dep_idx]
            .params
            .get(MODEL_NAME_KEY)
            .cloned();
        let token = self.services[dep_idx]
            .params
            .get(ACCESS_TOKEN_KEY)
            .cloned();
        let is_model_server = self.services[dep_idx].kind.is_dependent_infra()
            && self.services[dep_idx].kind != ServiceKind::VectorStore;

        let owner_idx = self.index[owner];
        let service = &mut self.services[owner_idx];
        service.set_param(format!("{prefix}_endpoint"), endpoint);
        service.set_param_num(format!("{prefix}_port"), port);
        if is_model_server {
            if let Some(model) = model {
                service
                    .params
                    .insert(format!("{prefix}_model_name"), model);
            }
            if let Some(token) = token {
                service
                    .params
                    .insert(format!("{prefix}_access_token"), token);
            }
        }
        if !service.dependent_service_refs.contains(dep) {
            service.dependent_service_refs.push(dep.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use weave_types::{FlowId, NodeCategory, NodeId, UiConfig};

    fn pipeline_node(id: &str, name: &str) -> Node {
        Node {
            id: NodeId::new(id),
            category: NodeCategory::Llm,
            name: name.to_string(),
            params: BTreeMap::new(),
            inference_params: BTreeMap::new(),
            dependent_services: BTreeMap::new(),
            connected_from: vec![],
            connected_to: vec![],
        }
    }

    fn bucket(model: &str, token: &str) -> BTreeMap<String, serde_json::Value> {
        BTreeMap::from([
            ("modelName".to_string(), serde_json::json!(model)),
            ("accessToken".to_string(), serde_json::json!(token)),
        ])
    }

    fn graph(nodes: Vec<Node>) -> FlowGraph {
        FlowGraph {
            id: FlowId::new("flow-1"),
            name: "test".into(),
            nodes,
            ui_config: UiConfig::default(),
            chat_input_ids: vec![],
            chat_completion_ids: vec![],
            doc_input_ids: vec![],
            visit_order: vec![],
        }
    }

    #[test]
    fn same_identity_key_shares_one_model_server() {
        let mut llm = pipeline_node("llm_0", "svc@llm");
        llm.dependent_services
            .insert("textgen_server".into(), bucket("acme/chat-7b", "tok"));
        let mut llm2 = pipeline_node("llm_1", "svc@llm");
        llm2.dependent_services
            .insert("textgen_server".into(), bucket("acme/chat-7b", "tok"));

        let topology = TopologyBuilder::new().build(&graph(vec![llm, llm2]));

        let servers: Vec<_> = topology
            .services
            .iter()
            .filter(|s| s.kind == ServiceKind::TextGenServer)
            .collect();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].service_id.as_str(), "textgen_server_0");

        // Both owners cross-link the single instance.
        for id in ["llm_0", "llm_1"] {
            let owner = topology.service(&ServiceId::new(id)).unwrap();
            assert_eq!(
                owner.params["textgen_server_endpoint"],
                serde_json::json!("textgen-server-0")
            );
            assert_eq!(
                owner.params["textgen_server_port"],
                serde_json::json!(servers[0].port)
            );
            assert_eq!(
                owner.params["textgen_server_model_name"],
                serde_json::json!("acme/chat-7b")
            );
        }
    }

    #[test]
    fn distinct_models_allocate_separate_servers() {
        let mut a = pipeline_node("embedding_0", "svc@embedding");
        a.dependent_services
            .insert("embed_server".into(), bucket("acme/embed-s", "NA"));
        let mut b = pipeline_node("reranking_0", "svc@reranking");
        b.dependent_services
            .insert("embed_server".into(), bucket("acme/rerank-s", "NA"));

        let topology = TopologyBuilder::new().build(&graph(vec![a, b]));

        let ids: Vec<_> = topology
            .services
            .iter()
            .filter(|s| s.kind == ServiceKind::EmbedServer)
            .map(|s| s.service_id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["embed_server_0", "embed_server_1"]);
    }

    #[test]
    fn ports_and_ids_are_unique() {
        let mut llm = pipeline_node("llm_0", "svc@llm");
        llm.dependent_services
            .insert("textgen_server".into(), bucket("acme/chat-7b", "tok"));
        let mut retriever = pipeline_node("retriever_0", "svc@retriever");
        retriever.connected_from.push(NodeId::new("vector_store_0"));
        let store = pipeline_node("vector_store_0", "vector_store");

        let topology =
            TopologyBuilder::new().build(&graph(vec![llm, retriever, store]));

        let ports = topology.ports();
        let unique_ports: HashSet<_> = ports.iter().collect();
        assert_eq!(ports.len(), unique_ports.len());
        let ids: HashSet<_> = topology
            .services
            .iter()
            .map(|s| s.service_id.as_str())
            .collect();
        assert_eq!(ids.len(), topology.services.len());
    }

    #[test]
    fn vector_store_gets_indexed_well_known_ports() {
        let mut retriever = pipeline_node("retriever_0", "svc@retriever");
        retriever.connected_from.push(NodeId::new("vector_store_1"));
        let store = pipeline_node("vector_store_1", "vector_store");

        let topology = TopologyBuilder::new().build(&graph(vec![retriever, store]));

        let store = topology.service(&ServiceId::new("vector_store_1")).unwrap();
        assert_eq!(store.port, 6380);
        assert_eq!(store.port_insight, Some(8002));

        let retriever = topology.service(&ServiceId::new("retriever_0")).unwrap();
        assert_eq!(
            retriever.params["vector_store_endpoint"],
            serde_json::json!("vector-store-1")
        );
        assert_eq!(
            retriever.params["vector_store_port"],
            serde_json::json!(6380)
        );
    }

    #[test]
    fn app_entry_aggregates_routes_and_ports() {
        let retriever = pipeline_node("retriever_0", "svc@retriever");
        let llm = pipeline_node("llm_0", "svc@llm");

        let topology = TopologyBuilder::new().build(&graph(vec![retriever, llm]));

        assert_eq!(
            topology.app.endpoint_list,
            vec!["retriever-0".to_string(), "llm-0".to_string()]
        );
        let retrieval = &topology.app.ui_config_info["retriever-0"];
        assert_eq!(retrieval.endpoint_path, "/v1/retrieval");
        assert_eq!(retrieval.url_name, "APP_RETRIEVAL_URL");
        assert!(topology.app.ports_info.contains_key("RETRIEVER_0_PORT"));
        assert!(topology.app.ports_info.contains_key("LLM_0_PORT"));
    }

    #[test]
    fn hosted_engine_gets_hosted_connection_keys() {
        let mut llm = pipeline_node("llm_0", "svc@llm");
        llm.params
            .insert("modelName".into(), serde_json::json!("gpt-4o"));
        llm.params
            .insert("accessToken".into(), serde_json::json!("sk-test"));

        let topology = TopologyBuilder::new().build(&graph(vec![llm]));

        let llm = topology.service(&ServiceId::new("llm_0")).unwrap();
        assert_eq!(
            llm.params["textgen_server_endpoint"],
            serde_json::json!("https://api.openai.com")
        );
        assert_eq!(llm.params["textgen_server_port"], serde_json::json!(443));
        assert_eq!(
            llm.params["textgen_server_model_name"],
            serde_json::json!("gpt-4o")
        );
        // No backing service is allocated for a hosted engine.
        assert_eq!(topology.services.len(), 1);
    }

    #[test]
    fn build_is_deterministic() {
        let make = || {
            let mut llm = pipeline_node("llm_0", "svc@llm");
            llm.dependent_services
                .insert("textgen_server".into(), bucket("acme/chat-7b", "tok"));
            let retriever = pipeline_node("retriever_0", "svc@retriever");
            TopologyBuilder::new().build(&graph(vec![llm, retriever]))
        };
        let a = make().to_pretty_json().unwrap();
        let b = make().to_pretty_json().unwrap();
        assert_eq!(a, b);
    }
}
