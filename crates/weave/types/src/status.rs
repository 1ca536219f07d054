//! Deployment lifecycle and status-stream model.
//!
//! One [`DeployJob`] is created per deployment attempt. Its progress is
//! reported as a sequence of [`StatusUpdate`]s whose `status` moves
//! monotonically forward through [`DeployStatus`], except that
//! `InProgress` is re-entered on every poll tick until a terminal state
//! is reached.

use crate::ids::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of log lines retained in a status update.
pub const LOG_TAIL_LINES: usize = 10;

/// Lifecycle states of one deployment attempt.
///
/// `Preparing`/`Extracting`/`Starting` are only reachable on the
/// remote-host transport; the control-plane transport enters
/// `InProgress` immediately after apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployStatus {
    Preparing,
    Extracting,
    Starting,
    InProgress,
    Done,
    Error,
}

impl DeployStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl std::fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Preparing => "Preparing",
            Self::Extracting => "Extracting",
            Self::Starting => "Starting",
            Self::InProgress => "InProgress",
            Self::Done => "Done",
            Self::Error => "Error",
        };
        write!(f, "{}", s)
    }
}

/// Which transport a deployment runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    /// In-cluster control-plane API.
    ControlPlane,
    /// Remote host over SSH + compose.
    RemoteHost,
}

/// Observed state of one service on the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    Running,
    Exited,
    Restarting,
    Other(String),
}

impl ServiceState {
    pub fn parse(s: &str) -> Self {
        match s {
            "running" => Self::Running,
            "exited" => Self::Exited,
            "restarting" => Self::Restarting,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Exited => write!(f, "exited"),
            Self::Restarting => write!(f, "restarting"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// One service row in a status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub state: ServiceState,
    /// Health probe result; empty when the target reports none.
    pub health: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl ServiceStatus {
    pub fn is_healthy(&self) -> bool {
        self.health.is_empty() || self.health == "healthy"
    }
}

/// Transport-agnostic result of one status poll.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub services: Vec<ServiceStatus>,
    /// Number of services the target expects to run; `None` while the
    /// target configuration is not yet readable.
    pub services_defined: Option<usize>,
    /// Most recent log lines from the target, bounded to
    /// [`LOG_TAIL_LINES`].
    pub log_tail: Vec<String>,
}

impl StatusSnapshot {
    pub fn running(&self) -> impl Iterator<Item = &ServiceStatus> {
        self.services
            .iter()
            .filter(|s| s.state == ServiceState::Running)
    }

    pub fn exited(&self) -> impl Iterator<Item = &ServiceStatus> {
        self.services
            .iter()
            .filter(|s| s.state == ServiceState::Exited)
    }

    pub fn restarting(&self) -> impl Iterator<Item = &ServiceStatus> {
        self.services
            .iter()
            .filter(|s| s.state == ServiceState::Restarting)
    }
}

/// One element of the deployment status stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: DeployStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_tail: Vec<String>,
}

impl StatusUpdate {
    pub fn new(status: DeployStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            services: Vec::new(),
            log_tail: Vec::new(),
        }
    }

    pub fn with_snapshot(status: DeployStatus, message: impl Into<String>, snap: &StatusSnapshot) -> Self {
        Self {
            status,
            message: message.into(),
            services: snap.services.clone(),
            log_tail: snap.log_tail.clone(),
        }
    }
}

/// Ephemeral record of one deployment attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployJob {
    pub id: JobId,
    /// Host or namespace identity of the target.
    pub target: String,
    pub transport: TransportKind,
    pub started_at: DateTime<Utc>,
    /// Last observed phase; mutated only by the status stream.
    pub status: DeployStatus,
    /// Most recent service log lines, bounded by [`LOG_TAIL_LINES`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_tail: Vec<String>,
}

impl DeployJob {
    pub fn new(target: impl Into<String>, transport: TransportKind) -> Self {
        Self {
            id: JobId::generate(),
            target: target.into(),
            transport,
            started_at: Utc::now(),
            status: DeployStatus::Preparing,
            log_tail: Vec::new(),
        }
    }

    /// Fold one status-stream element into the record.
    pub fn observe(&mut self, update: &StatusUpdate) {
        self.status = update.status;
        if !update.log_tail.is_empty() {
            self.log_tail = update.log_tail.clone();
            self.log_tail.truncate(LOG_TAIL_LINES);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(DeployStatus::Done.is_terminal());
        assert!(DeployStatus::Error.is_terminal());
        assert!(!DeployStatus::InProgress.is_terminal());
        assert!(!DeployStatus::Preparing.is_terminal());
    }

    #[test]
    fn empty_health_counts_as_healthy() {
        let s = ServiceStatus {
            name: "llm-0".into(),
            state: ServiceState::Running,
            health: String::new(),
            exit_code: None,
        };
        assert!(s.is_healthy());
    }

    #[test]
    fn snapshot_filters_by_state() {
        let snap = StatusSnapshot {
            services: vec![
                ServiceStatus {
                    name: "a".into(),
                    state: ServiceState::Running,
                    health: "healthy".into(),
                    exit_code: None,
                },
                ServiceStatus {
                    name: "b".into(),
                    state: ServiceState::Exited,
                    health: String::new(),
                    exit_code: Some(1),
                },
            ],
            services_defined: Some(2),
            log_tail: vec![],
        };
        assert_eq!(snap.running().count(), 1);
        assert_eq!(snap.exited().count(), 1);
        assert_eq!(snap.restarting().count(), 0);
    }

    #[test]
    fn job_record_follows_the_status_stream() {
        let mut job = DeployJob::new("ops@10.0.0.5:22", TransportKind::RemoteHost);
        assert_eq!(job.status, DeployStatus::Preparing);

        job.observe(&StatusUpdate::new(DeployStatus::Extracting, "unpacking"));
        assert_eq!(job.status, DeployStatus::Extracting);
        assert!(job.log_tail.is_empty());

        let mut with_logs = StatusUpdate::new(DeployStatus::Error, "llm-0 exited");
        with_logs.log_tail = (0..LOG_TAIL_LINES + 4).map(|i| format!("line {i}")).collect();
        job.observe(&with_logs);
        assert_eq!(job.status, DeployStatus::Error);
        assert_eq!(job.log_tail.len(), LOG_TAIL_LINES);
    }
}
