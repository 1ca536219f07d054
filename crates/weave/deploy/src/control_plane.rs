//! Control-plane transport.
//!
//! Applies manifest documents through a cluster API behind the
//! [`ControlPlaneApi`] trait: an HTTP client for production and an
//! in-memory implementation for tests. Apply is per-document; an
//! unsupported kind is recorded and skipped, only connectivity loss
//! aborts the batch.

use crate::error::{DeployError, DeployResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};
use weave_health::{HealthError, HealthResult, StatusProbe};
use weave_types::{ServiceState, ServiceStatus, StatusSnapshot};

/// Document kinds the control plane can apply.
pub const SUPPORTED_KINDS: &[&str] = &[
    "ConfigMap",
    "Service",
    "Deployment",
    "Secret",
    "PersistentVolumeClaim",
];

/// Per-document apply outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Unsupported,
    Failed(String),
}

/// Record of one manifest document's apply.
#[derive(Debug, Clone)]
pub struct ApplyRecord {
    pub kind: String,
    pub name: String,
    pub outcome: ApplyOutcome,
}

/// Cluster operations the control-plane transport needs.
#[async_trait]
pub trait ControlPlaneApi: Send + Sync {
    /// Create the isolation scope if it does not exist yet.
    async fn ensure_namespace(&self, namespace: &str) -> DeployResult<()>;

    /// Apply one manifest document.
    async fn apply_document(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
        document: &serde_yaml::Value,
    ) -> DeployResult<()>;

    /// Poll workload status in the namespace.
    async fn list_status(&self, namespace: &str) -> DeployResult<StatusSnapshot>;

    /// Register the monitoring dashboard for a deployed flow.
    async fn register_dashboard(&self, namespace: &str, flow: &str) -> DeployResult<()>;
}

/// Apply every document of a multi-doc manifest.
///
/// Unsupported kinds and per-document failures are recorded without
/// aborting the batch; a connectivity failure is fatal.
#[instrument(skip(api, manifest))]
pub async fn apply_manifest(
    api: &dyn ControlPlaneApi,
    namespace: &str,
    manifest: &str,
) -> DeployResult<Vec<ApplyRecord>> {
    api.ensure_namespace(namespace).await?;

    let mut records = Vec::new();
    // The yaml deserializer is not Send, so parse every document up
    // front instead of holding the iterator across the await below.
    let docs: Vec<Result<serde_yaml::Value, serde_yaml::Error>> =
        serde_yaml::Deserializer::from_str(manifest)
            .map(serde_yaml::Value::deserialize)
            .collect();
    for doc in docs {
        let value = doc?;
        if value.is_null() {
            continue;
        }
        let kind = value["kind"].as_str().unwrap_or_default().to_string();
        let name = value["metadata"]["name"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        if !SUPPORTED_KINDS.contains(&kind.as_str()) {
            let err = DeployError::UnsupportedKind {
                kind: kind.clone(),
                name: name.clone(),
            };
            warn!(error = %err, "skipping document");
            records.push(ApplyRecord {
                kind,
                name,
                outcome: ApplyOutcome::Unsupported,
            });
            continue;
        }

        let outcome = match api.apply_document(namespace, &kind, &name, &value).await {
            Ok(()) => ApplyOutcome::Applied,
            Err(DeployError::Connectivity(e)) => return Err(DeployError::Connectivity(e)),
            Err(e) => ApplyOutcome::Failed(e.to_string()),
        };
        debug!(kind, name, ?outcome, "document applied");
        records.push(ApplyRecord {
            kind,
            name,
            outcome,
        });
    }
    Ok(records)
}

/// HTTP client for the cluster control-plane API.
pub struct HttpControlPlane {
    base_url: String,
    client: reqwest::Client,
}

impl HttpControlPlane {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn map_err(err: reqwest::Error) -> DeployError {
        if err.is_connect() || err.is_timeout() {
            DeployError::Connectivity(err.to_string())
        } else {
            DeployError::Api(err.to_string())
        }
    }

    async fn check(response: reqwest::Response) -> DeployResult<reqwest::Response> {
        response
            .error_for_status()
            .map_err(|e| DeployError::Api(e.to_string()))
    }
}

/// One workload row from the status endpoint.
#[derive(Debug, Deserialize)]
struct WorkloadRow {
    name: String,
    state: String,
    #[serde(default)]
    health: String,
    #[serde(default)]
    exit_code: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    workloads: Vec<WorkloadRow>,
    #[serde(default)]
    defined: Option<usize>,
    #[serde(default)]
    log_tail: Vec<String>,
}

#[async_trait]
impl ControlPlaneApi for HttpControlPlane {
    async fn ensure_namespace(&self, namespace: &str) -> DeployResult<()> {
        let url = format!("{}/namespaces", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "name": namespace }))
            .send()
            .await
            .map_err(Self::map_err)?;
        // Already-exists is success: create-if-absent is idempotent.
        if response.status() == reqwest::StatusCode::CONFLICT {
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn apply_document(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
        document: &serde_yaml::Value,
    ) -> DeployResult<()> {
        let url = format!("{}/namespaces/{namespace}/apply", self.base_url);
        let document =
            serde_json::to_value(document).map_err(|e| DeployError::Api(e.to_string()))?;
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "kind": kind,
                "name": name,
                "document": document,
            }))
            .send()
            .await
            .map_err(Self::map_err)?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list_status(&self, namespace: &str) -> DeployResult<StatusSnapshot> {
        let url = format!("{}/namespaces/{namespace}/status", self.base_url);
        let response = self.client.get(&url).send().await.map_err(Self::map_err)?;
        let status: StatusResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| DeployError::Api(e.to_string()))?;
        Ok(StatusSnapshot {
            services: status
                .workloads
                .into_iter()
                .map(|w| ServiceStatus {
                    name: w.name,
                    state: ServiceState::parse(&w.state),
                    health: w.health,
                    exit_code: w.exit_code,
                })
                .collect(),
            services_defined: status.defined,
            log_tail: status.log_tail,
        })
    }

    async fn register_dashboard(&self, namespace: &str, flow: &str) -> DeployResult<()> {
        let url = format!("{}/dashboards", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "namespace": namespace, "flow": flow }))
            .send()
            .await
            .map_err(Self::map_err)?;
        Self::check(response).await?;
        Ok(())
    }
}

/// Health probe over a control-plane client. The client handle is
/// reused across polls; transient API errors surface as retryable probe
/// failures.
pub struct ControlPlaneProbe {
    api: Arc<dyn ControlPlaneApi>,
    namespace: String,
}

impl ControlPlaneProbe {
    pub fn new(api: Arc<dyn ControlPlaneApi>, namespace: impl Into<String>) -> Self {
        Self {
            api,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl StatusProbe for ControlPlaneProbe {
    async fn snapshot(&self) -> HealthResult<StatusSnapshot> {
        self.api
            .list_status(&self.namespace)
            .await
            .map_err(|e| HealthError::Probe(e.to_string()))
    }
}

/// In-memory control plane for tests.
#[derive(Default)]
pub struct InMemoryControlPlane {
    state: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    namespaces: Vec<String>,
    applied: BTreeMap<String, Vec<(String, String)>>,
    dashboards: Vec<(String, String)>,
    status: Option<StatusSnapshot>,
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the snapshot `list_status` reports.
    pub fn set_status(&self, snapshot: StatusSnapshot) {
        if let Ok(mut state) = self.state.lock() {
            state.status = Some(snapshot);
        }
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.namespaces.clone())
            .unwrap_or_default()
    }

    /// (kind, name) pairs applied to a namespace, in order.
    pub fn applied(&self, namespace: &str) -> Vec<(String, String)> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.applied.get(namespace).cloned())
            .unwrap_or_default()
    }

    pub fn dashboards(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .map(|s| s.dashboards.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> DeployResult<std::sync::MutexGuard<'_, InMemoryState>> {
        self.state
            .lock()
            .map_err(|_| DeployError::Api("state poisoned".to_string()))
    }
}

#[async_trait]
impl ControlPlaneApi for InMemoryControlPlane {
    async fn ensure_namespace(&self, namespace: &str) -> DeployResult<()> {
        let mut state = self.lock()?;
        if !state.namespaces.iter().any(|n| n == namespace) {
            state.namespaces.push(namespace.to_string());
        }
        Ok(())
    }

    async fn apply_document(
        &self,
        namespace: &str,
        kind: &str,
        name: &str,
        _document: &serde_yaml::Value,
    ) -> DeployResult<()> {
        let mut state = self.lock()?;
        state
            .applied
            .entry(namespace.to_string())
            .or_default()
            .push((kind.to_string(), name.to_string()));
        Ok(())
    }

    async fn list_status(&self, _namespace: &str) -> DeployResult<StatusSnapshot> {
        let state = self.lock()?;
        Ok(state.status.clone().unwrap_or_default())
    }

    async fn register_dashboard(&self, namespace: &str, flow: &str) -> DeployResult<()> {
        let mut state = self.lock()?;
        state
            .dashboards
            .push((namespace.to_string(), flow.to_string()));
        Ok(())
    }
}
