//! Deployment orchestration.
//!
//! One job per deployment attempt. The orchestrator stages the bundle,
//! runs the transport, then hands supervision to the health watcher; the
//! caller gets a [`JobHandle`] immediately and drains the status stream.
//! Every update is folded into the job record before it is forwarded, so
//! `job(id)` always answers the last observed phase and log tail.
//! Dropping the receiver cancels cooperatively.
//!
//! Deployments to distinct targets proceed fully independently; a
//! per-target advisory lock serializes concurrent deployments to the
//! same target, held through apply and the initial poll.

use crate::bundle::Bundle;
use crate::control_plane::{apply_manifest, ApplyOutcome, ControlPlaneApi, ControlPlaneProbe};
use crate::error::{DeployError, DeployResult};
use crate::remote::RemoteTransport;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, instrument, warn};
use weave_health::{ComposeProbe, HealthWatcher, StatusProbe, WatcherConfig};
use weave_render::{ArtifactSet, MANIFEST_FILE};
use weave_types::{
    DeployJob, DeployStatus, FlowId, JobId, RemoteTarget, StatusUpdate, TransportKind,
};

/// Size of the per-job status channel.
const UPDATE_BUFFER: usize = 64;

/// A started deployment: its job record and the status stream.
#[derive(Debug)]
pub struct JobHandle {
    pub job: DeployJob,
    pub updates: mpsc::Receiver<StatusUpdate>,
}

/// Starts deployments and tracks their job records.
pub struct Orchestrator {
    jobs: Arc<DashMap<JobId, DeployJob>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    watcher_config: WatcherConfig,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            locks: DashMap::new(),
            watcher_config: WatcherConfig::default(),
        }
    }

    pub fn with_watcher_config(watcher_config: WatcherConfig) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            locks: DashMap::new(),
            watcher_config,
        }
    }

    /// Look up a job record.
    pub fn job(&self, id: &JobId) -> Option<DeployJob> {
        self.jobs.get(id).map(|j| j.clone())
    }

    /// All job records, newest last.
    pub fn jobs(&self) -> Vec<DeployJob> {
        let mut jobs: Vec<DeployJob> = self.jobs.iter().map(|j| j.clone()).collect();
        jobs.sort_by_key(|j| j.started_at);
        jobs
    }

    fn target_lock(&self, label: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(label.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Interpose a sender that folds every update into the job record
    /// before forwarding it to the caller.
    fn relay(&self, job_id: JobId, tx: mpsc::Sender<StatusUpdate>) -> mpsc::Sender<StatusUpdate> {
        let jobs = self.jobs.clone();
        let (inner_tx, mut inner_rx) = mpsc::channel(UPDATE_BUFFER);
        tokio::spawn(async move {
            while let Some(update) = inner_rx.recv().await {
                if let Some(mut job) = jobs.get_mut(&job_id) {
                    job.observe(&update);
                }
                if tx.send(update).await.is_err() {
                    return;
                }
            }
        });
        inner_tx
    }

    /// Deploy to a remote host over ssh + compose.
    ///
    /// Staging errors surface synchronously; everything after returns
    /// through the status stream.
    #[instrument(skip(self, artifacts), fields(target = %target.label()))]
    pub fn deploy_remote(
        &self,
        target: RemoteTarget,
        artifacts: &ArtifactSet,
    ) -> DeployResult<JobHandle> {
        let bundle = Bundle::stage(artifacts)?;
        let job = DeployJob::new(target.label(), TransportKind::RemoteHost);
        self.jobs.insert(job.id.clone(), job.clone());

        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);
        let tx = self.relay(job.id.clone(), tx);
        let lock = self.target_lock(&target.label());
        let watcher_config = self.watcher_config;
        let jobs = self.jobs.clone();
        let job_id = job.id.clone();

        tokio::spawn(async move {
            let guard = lock.lock().await;

            let transport = RemoteTransport::new(target.clone());
            if let Err(err) = transport.deploy(&bundle, &tx).await {
                let _ = tx
                    .send(StatusUpdate::new(DeployStatus::Error, err.to_string()))
                    .await;
                return;
            }
            // Local staging is released before supervision begins.
            drop(bundle);

            let probe: Arc<dyn StatusProbe> = Arc::new(ComposeProbe::new(target));
            if let Ok(snap) = probe.snapshot().await {
                let _ = tx
                    .send(StatusUpdate::with_snapshot(
                        DeployStatus::InProgress,
                        "services starting",
                        &snap,
                    ))
                    .await;
            }
            drop(guard);

            let final_status = HealthWatcher::with_config(probe, watcher_config)
                .watch(&tx)
                .await;
            if let Some(mut job) = jobs.get_mut(&job_id) {
                job.status = final_status;
            }
            info!(job = %job_id, status = %final_status, "deployment finished");
        });

        Ok(JobHandle { job, updates: rx })
    }

    /// Deploy through the cluster control plane.
    #[instrument(skip(self, api, artifacts), fields(namespace))]
    pub fn deploy_control_plane(
        &self,
        api: Arc<dyn ControlPlaneApi>,
        namespace: impl Into<String>,
        flow_id: &FlowId,
        artifacts: &ArtifactSet,
    ) -> DeployResult<JobHandle> {
        let namespace = namespace.into();
        let manifest = artifacts
            .get(MANIFEST_FILE)
            .ok_or_else(|| DeployError::MissingArtifact {
                name: MANIFEST_FILE.to_string(),
            })?
            .to_string();

        let job = DeployJob::new(namespace.clone(), TransportKind::ControlPlane);
        self.jobs.insert(job.id.clone(), job.clone());

        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);
        let tx = self.relay(job.id.clone(), tx);
        let lock = self.target_lock(&namespace);
        let watcher_config = self.watcher_config;
        let jobs = self.jobs.clone();
        let flow = flow_id.as_str().to_string();
        let job_id = job.id.clone();

        tokio::spawn(async move {
            let guard = lock.lock().await;

            let records = match apply_manifest(api.as_ref(), &namespace, &manifest).await {
                Ok(records) => records,
                Err(err) => {
                    let _ = tx
                        .send(StatusUpdate::new(DeployStatus::Error, err.to_string()))
                        .await;
                    return;
                }
            };
            let applied = records
                .iter()
                .filter(|r| r.outcome == ApplyOutcome::Applied)
                .count();
            let skipped: Vec<&str> = records
                .iter()
                .filter(|r| r.outcome != ApplyOutcome::Applied)
                .map(|r| r.name.as_str())
                .collect();
            let message = if skipped.is_empty() {
                format!("applied {applied} documents")
            } else {
                format!("applied {applied} documents, skipped: {}", skipped.join(", "))
            };
            if tx
                .send(StatusUpdate::new(DeployStatus::InProgress, message))
                .await
                .is_err()
            {
                return;
            }

            if let Err(err) = api.register_dashboard(&namespace, &flow).await {
                warn!(error = %err, "dashboard registration failed");
            }

            let probe: Arc<dyn StatusProbe> =
                Arc::new(ControlPlaneProbe::new(api, namespace.clone()));
            if let Ok(snap) = probe.snapshot().await {
                let _ = tx
                    .send(StatusUpdate::with_snapshot(
                        DeployStatus::InProgress,
                        "workloads starting",
                        &snap,
                    ))
                    .await;
            }
            drop(guard);

            let final_status = HealthWatcher::with_config(probe, watcher_config)
                .watch(&tx)
                .await;
            if let Some(mut job) = jobs.get_mut(&job_id) {
                job.status = final_status;
            }
            info!(job = %job_id, status = %final_status, "deployment finished");
        });

        Ok(JobHandle { job, updates: rx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_plane::InMemoryControlPlane;
    use weave_render::Artifact;
    use weave_types::{ServiceState, ServiceStatus, StatusSnapshot};

    fn artifacts() -> ArtifactSet {
        ArtifactSet {
            files: vec![Artifact {
                name: MANIFEST_FILE.to_string(),
                content: concat!(
                    "apiVersion: v1\n",
                    "kind: Service\n",
                    "metadata:\n",
                    "  name: llm-0\n",
                    "---\n",
                    "apiVersion: apps/v1\n",
                    "kind: Deployment\n",
                    "metadata:\n",
                    "  name: llm-0\n",
                )
                .to_string(),
            }],
        }
    }

    fn healthy_snapshot() -> StatusSnapshot {
        StatusSnapshot {
            services: vec![ServiceStatus {
                name: "llm-0".into(),
                state: ServiceState::Running,
                health: "healthy".into(),
                exit_code: None,
            }],
            services_defined: Some(1),
            log_tail: vec!["llm-0  | ready".into()],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn control_plane_deploy_reaches_done() {
        let api = Arc::new(InMemoryControlPlane::new());
        api.set_status(healthy_snapshot());

        let orchestrator = Orchestrator::new();
        let mut handle = orchestrator
            .deploy_control_plane(
                api.clone(),
                "flows",
                &FlowId::new("flow-1"),
                &artifacts(),
            )
            .unwrap();

        let mut last = None;
        while let Some(update) = handle.updates.recv().await {
            let terminal = update.status.is_terminal();
            last = Some(update);
            if terminal {
                break;
            }
        }
        let last = last.unwrap();
        assert_eq!(last.status, DeployStatus::Done);

        assert_eq!(api.namespaces(), vec!["flows".to_string()]);
        assert_eq!(api.applied("flows").len(), 2);
        assert_eq!(
            api.dashboards(),
            vec![("flows".to_string(), "flow-1".to_string())]
        );
        assert_eq!(handle.job.transport, TransportKind::ControlPlane);
        assert!(orchestrator.job(&handle.job.id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn job_record_tracks_the_stream_to_terminal() {
        let api = Arc::new(InMemoryControlPlane::new());
        api.set_status(healthy_snapshot());

        let orchestrator = Orchestrator::new();
        let mut handle = orchestrator
            .deploy_control_plane(
                api.clone(),
                "flows",
                &FlowId::new("flow-1"),
                &artifacts(),
            )
            .unwrap();
        assert_eq!(handle.job.status, DeployStatus::Preparing);

        while let Some(update) = handle.updates.recv().await {
            if update.status.is_terminal() {
                break;
            }
        }

        // The relay folds every update into the record before forwarding
        // it, so a received terminal update means the record is terminal.
        let job = orchestrator.job(&handle.job.id).unwrap();
        assert_eq!(job.status, DeployStatus::Done);
        assert_eq!(job.log_tail, vec!["llm-0  | ready".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_manifest_fails_synchronously() {
        let orchestrator = Orchestrator::new();
        let err = orchestrator
            .deploy_control_plane(
                Arc::new(InMemoryControlPlane::new()),
                "flows",
                &FlowId::new("flow-1"),
                &ArtifactSet::default(),
            )
            .unwrap_err();
        assert!(matches!(err, DeployError::MissingArtifact { .. }));
    }

    #[test]
    fn target_locks_are_keyed() {
        let orchestrator = Orchestrator::new();
        let a = orchestrator.target_lock("host-a");
        let a2 = orchestrator.target_lock("host-a");
        let b = orchestrator.target_lock("host-b");
        assert!(Arc::ptr_eq(&a, &a2));
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
