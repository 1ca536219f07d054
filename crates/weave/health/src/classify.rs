//! Snapshot classification.
//!
//! Pure rules over one [`StatusSnapshot`]; the watcher loop owns timing,
//! settle delays, and the confirmatory re-poll.

use crate::error::HealthError;
use weave_types::StatusSnapshot;

/// Service roles that are expected to run to completion and exit.
pub const EXPECTED_COMPLETED_ROLES: &[&str] = &[
    "model-downloader",
    "downloader",
    "init",
    "setup",
    "migrate",
    "seed",
];

/// Whether an exited service with this name counts as expected-completed.
pub fn is_expected_completed(name: &str) -> bool {
    EXPECTED_COMPLETED_ROLES
        .iter()
        .any(|role| name.contains(role))
}

/// Outcome of classifying one snapshot.
#[derive(Debug)]
pub enum Verdict {
    /// All defined services are accounted for; confirm after a settle
    /// delay before reporting Done.
    Ready,
    /// Not conclusive yet; keep polling.
    InProgress(String),
    /// Terminal failure.
    Failed(HealthError),
}

/// Apply the classification rules to one snapshot.
pub fn classify(snap: &StatusSnapshot) -> Verdict {
    // 1. Any unhealthy service fails immediately.
    let unhealthy: Vec<String> = snap
        .services
        .iter()
        .filter(|s| !s.is_healthy())
        .map(|s| s.name.clone())
        .collect();
    if !unhealthy.is_empty() {
        return Verdict::Failed(HealthError::Unhealthy {
            services: unhealthy,
        });
    }

    // 2. Exited services are either run-to-completion roles or failures.
    let mut expected_completed = 0usize;
    let mut unexpected: Vec<String> = Vec::new();
    for service in snap.exited() {
        if is_expected_completed(&service.name) {
            expected_completed += 1;
        } else {
            match service.exit_code {
                Some(code) => unexpected.push(format!("{} (exit {code})", service.name)),
                None => unexpected.push(service.name.clone()),
            }
        }
    }
    if !unexpected.is_empty() {
        return Verdict::Failed(HealthError::UnexpectedExit {
            services: unexpected,
        });
    }

    // 3. Tolerate slow startup: a missing or short definition is not an
    //    error.
    let Some(defined) = snap.services_defined else {
        return Verdict::InProgress("service definition not yet readable".to_string());
    };
    if snap.services.len() < defined {
        return Verdict::InProgress(format!(
            "{} of {defined} services reported",
            snap.services.len()
        ));
    }

    let running = snap.running().count();
    if running > 0 && running + expected_completed == defined {
        return Verdict::Ready;
    }
    Verdict::InProgress(format!("{running} of {defined} services running"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_types::{ServiceState, ServiceStatus};

    fn svc(name: &str, state: ServiceState, exit_code: Option<i32>) -> ServiceStatus {
        ServiceStatus {
            name: name.to_string(),
            state,
            health: String::new(),
            exit_code,
        }
    }

    fn snapshot(services: Vec<ServiceStatus>, defined: Option<usize>) -> StatusSnapshot {
        StatusSnapshot {
            services,
            services_defined: defined,
            log_tail: vec![],
        }
    }

    #[test]
    fn exited_downloader_is_expected_completed() {
        let snap = snapshot(
            vec![
                svc("embedding-0", ServiceState::Running, None),
                svc("retriever-0", ServiceState::Running, None),
                svc("llm-0", ServiceState::Running, None),
                svc("vector-store-0", ServiceState::Running, None),
                svc("model-downloader-0", ServiceState::Exited, Some(0)),
            ],
            Some(5),
        );
        assert!(matches!(classify(&snap), Verdict::Ready));
    }

    #[test]
    fn unexpected_exit_names_the_service() {
        let snap = snapshot(
            vec![
                svc("retriever-0", ServiceState::Running, None),
                svc("llm-0", ServiceState::Running, None),
                svc("vector-store-0", ServiceState::Running, None),
                svc("textgen-server-0", ServiceState::Running, None),
                svc("embedding-service-0", ServiceState::Exited, Some(1)),
            ],
            Some(5),
        );
        match classify(&snap) {
            Verdict::Failed(HealthError::UnexpectedExit { services }) => {
                assert_eq!(services, vec!["embedding-service-0 (exit 1)"]);
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn unhealthy_service_fails_immediately() {
        let mut unhealthy = svc("llm-0", ServiceState::Running, None);
        unhealthy.health = "unhealthy".to_string();
        let snap = snapshot(vec![unhealthy], Some(1));
        match classify(&snap) {
            Verdict::Failed(HealthError::Unhealthy { services }) => {
                assert_eq!(services, vec!["llm-0"]);
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn missing_definition_stays_in_progress() {
        let snap = snapshot(vec![svc("llm-0", ServiceState::Running, None)], None);
        assert!(matches!(classify(&snap), Verdict::InProgress(_)));
    }

    #[test]
    fn short_service_list_stays_in_progress() {
        let snap = snapshot(vec![svc("llm-0", ServiceState::Running, None)], Some(5));
        match classify(&snap) {
            Verdict::InProgress(msg) => assert!(msg.contains("1 of 5")),
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn no_running_services_is_not_ready() {
        let snap = snapshot(
            vec![svc("model-downloader-0", ServiceState::Exited, Some(0))],
            Some(1),
        );
        assert!(matches!(classify(&snap), Verdict::InProgress(_)));
    }
}
