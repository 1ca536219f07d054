//! End-to-end render of a compiled retrieval-augmented chat pipeline.

use serde::Deserialize;
use weave_graph::GraphBuilder;
use weave_render::{RenderEnv, Renderer};
use weave_topology::TopologyBuilder;
use weave_types::Topology;

fn rag_topology() -> Topology {
    let payload = serde_json::json!({
        "id": "flow-rag",
        "name": "rag chat",
        "flowData": {
            "nodes": [
                {
                    "id": "chat_input_0", "name": "chat_input", "category": "Controls",
                    "inputs": {}, "inputParams": []
                },
                {
                    "id": "vector_store_0", "name": "vector_store", "category": "VectorStores",
                    "inputs": {}, "inputParams": []
                },
                {
                    "id": "embedding_0", "name": "svc@embedding", "category": "Embeddings",
                    "inputs": { "query": "{{chat_input_0.output}}" },
                    "inputParams": [{ "name": "query", "type": "string" }],
                    "dependentServices": {
                        "embed_server": { "modelName": "acme/embed-s", "accessToken": "" }
                    }
                },
                {
                    "id": "retriever_0", "name": "svc@retriever", "category": "Retriever",
                    "inputs": {
                        "embedding": "{{embedding_0.output}}",
                        "store": "{{vector_store_0.output}}"
                    },
                    "inputParams": [
                        { "name": "embedding", "type": "string" },
                        { "name": "store", "type": "string" }
                    ]
                },
                {
                    "id": "llm_0", "name": "svc@llm", "category": "LLM",
                    "inputs": {
                        "docs": "{{retriever_0.output}}",
                        "engine": "textgen_server",
                        "modelName": "acme/chat-7b",
                        "accessToken": "tok"
                    },
                    "inputParams": [
                        { "name": "docs", "type": "string" },
                        { "name": "engine", "type": "options" },
                        { "name": "modelName", "type": "string" },
                        { "name": "accessToken", "type": "credential" }
                    ],
                    "dependentServices": {
                        "textgen_server": { "modelName": "", "accessToken": "" }
                    }
                },
                {
                    "id": "chat_completion_0", "name": "chat_completion", "category": "Controls",
                    "inputs": { "answer": "{{llm_0.output}}" },
                    "inputParams": [{ "name": "answer", "type": "string" }]
                }
            ]
        }
    });
    let raw: weave_graph::RawFlow = serde_json::from_value(payload).unwrap();
    let graph = GraphBuilder::new().build(&raw).unwrap();
    TopologyBuilder::new().build(&graph)
}

#[test]
fn compose_services_match_the_topology() {
    let topology = rag_topology();
    let artifacts = Renderer::new(RenderEnv::default())
        .render_artifacts(&topology)
        .unwrap();

    let compose: serde_yaml::Value =
        serde_yaml::from_str(artifacts.get("compose.yaml").unwrap()).unwrap();
    let services = compose["services"].as_mapping().unwrap();
    let names: Vec<&str> = services.keys().filter_map(|k| k.as_str()).collect();

    let expected = [
        "embedding-0",
        "retriever-0",
        "llm-0",
        "embed-server-0",
        "vector-store-0",
        "textgen-server-0",
        "app",
    ];
    for name in names {
        assert!(expected.contains(&name), "unexpected service {name}");
    }
    assert_eq!(services.len(), expected.len());

    // Cross-links resolved into connection strings.
    let llm_env = &compose["services"]["llm-0"]["environment"];
    let textgen_port = topology
        .service_by_endpoint("textgen-server-0")
        .unwrap()
        .port;
    assert_eq!(
        llm_env["TEXTGEN_ENDPOINT"].as_str().unwrap(),
        format!("http://textgen-server-0:{textgen_port}")
    );
}

#[test]
fn manifest_ports_are_numeric() {
    let artifacts = Renderer::new(RenderEnv::default())
        .render_artifacts(&rag_topology())
        .unwrap();
    let manifest = artifacts.get("manifest.yaml").unwrap();

    for doc in serde_yaml::Deserializer::from_str(manifest) {
        let value = serde_yaml::Value::deserialize(doc).unwrap();
        if value["kind"].as_str() == Some("Service") {
            for port in value["spec"]["ports"].as_sequence().unwrap() {
                assert!(port["port"].is_number(), "port must be numeric: {port:?}");
            }
        }
    }
}

#[test]
fn proxy_fragment_routes_every_ui_service() {
    let topology = rag_topology();
    let artifacts = Renderer::new(RenderEnv::default())
        .render_artifacts(&topology)
        .unwrap();
    let proxy = artifacts.get("app.proxy.conf").unwrap();

    assert!(proxy.contains("location /v1/embeddings"));
    assert!(proxy.contains("location /v1/retrieval"));
    assert!(proxy.contains("location /v1/chat/completions"));
    assert!(proxy.contains("proxy_pass http://llm-0:"));
}

#[test]
fn rerender_is_byte_identical() {
    let topology = rag_topology();
    let render = || {
        Renderer::new(RenderEnv::default())
            .render_artifacts(&topology)
            .unwrap()
    };
    let a = render();
    let b = render();
    assert_eq!(a.names(), b.names());
    for file in &a.files {
        assert_eq!(Some(file.content.as_str()), b.get(&file.name));
    }
}
