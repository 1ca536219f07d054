//! The readiness watcher loop.
//!
//! Polls a [`StatusProbe`] on a fixed cadence and pushes a
//! [`StatusUpdate`] per tick. `InProgress` is re-entered freely; a Ready
//! verdict is only reported as `Done` after a settle delay and a
//! confirmatory poll that finds no service restarting. The loop stops on
//! the first terminal state or when the receiver is dropped.

use crate::classify::{classify, Verdict};
use crate::error::HealthError;
use crate::probe::StatusProbe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use weave_types::{DeployStatus, StatusUpdate};

/// Timing of the watcher loop.
#[derive(Debug, Clone, Copy)]
pub struct WatcherConfig {
    /// Delay between polls.
    pub cadence: Duration,
    /// Settle delay before the confirmatory poll.
    pub settle: Duration,
    /// Consecutive probe failures tolerated before giving up.
    pub max_probe_failures: u32,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            cadence: Duration::from_secs(2),
            settle: Duration::from_secs(5),
            max_probe_failures: 2,
        }
    }
}

/// Supervises one deployment until it is Done or Error.
pub struct HealthWatcher {
    probe: Arc<dyn StatusProbe>,
    config: WatcherConfig,
}

impl HealthWatcher {
    pub fn new(probe: Arc<dyn StatusProbe>) -> Self {
        Self {
            probe,
            config: WatcherConfig::default(),
        }
    }

    pub fn with_config(probe: Arc<dyn StatusProbe>, config: WatcherConfig) -> Self {
        Self { probe, config }
    }

    /// Run the watch loop, pushing an update per tick.
    ///
    /// Returns the final status. A closed receiver cancels cooperatively:
    /// the next scheduled poll is simply not issued.
    #[instrument(skip(self, updates))]
    pub async fn watch(&self, updates: &mpsc::Sender<StatusUpdate>) -> DeployStatus {
        let mut probe_failures = 0u32;

        loop {
            match self.probe.snapshot().await {
                Err(err) => {
                    probe_failures += 1;
                    if probe_failures >= self.config.max_probe_failures {
                        let _ = updates
                            .send(StatusUpdate::new(DeployStatus::Error, err.to_string()))
                            .await;
                        return DeployStatus::Error;
                    }
                    warn!(error = %err, "status poll failed, retrying");
                }
                Ok(snap) => {
                    probe_failures = 0;
                    match classify(&snap) {
                        Verdict::Failed(err) => {
                            let _ = updates
                                .send(StatusUpdate::with_snapshot(
                                    DeployStatus::Error,
                                    err.to_string(),
                                    &snap,
                                ))
                                .await;
                            return DeployStatus::Error;
                        }
                        Verdict::InProgress(message) => {
                            if updates
                                .send(StatusUpdate::with_snapshot(
                                    DeployStatus::InProgress,
                                    message,
                                    &snap,
                                ))
                                .await
                                .is_err()
                            {
                                return DeployStatus::InProgress;
                            }
                        }
                        Verdict::Ready => return self.confirm(updates).await,
                    }
                }
            }

            if updates.is_closed() {
                return DeployStatus::InProgress;
            }
            tokio::time::sleep(self.config.cadence).await;
        }
    }

    /// Settle, then re-poll to rule out restart loops before Done.
    async fn confirm(&self, updates: &mpsc::Sender<StatusUpdate>) -> DeployStatus {
        if updates
            .send(StatusUpdate::new(
                DeployStatus::InProgress,
                "settling before confirmation",
            ))
            .await
            .is_err()
        {
            return DeployStatus::InProgress;
        }
        tokio::time::sleep(self.config.settle).await;

        let snap = match self.probe.snapshot().await {
            Ok(snap) => snap,
            Err(err) => {
                let _ = updates
                    .send(StatusUpdate::new(DeployStatus::Error, err.to_string()))
                    .await;
                return DeployStatus::Error;
            }
        };

        let restarting: Vec<String> = snap.restarting().map(|s| s.name.clone()).collect();
        if !restarting.is_empty() {
            let err = HealthError::RestartLoop {
                services: restarting,
            };
            let _ = updates
                .send(StatusUpdate::with_snapshot(
                    DeployStatus::Error,
                    err.to_string(),
                    &snap,
                ))
                .await;
            return DeployStatus::Error;
        }

        info!("deployment healthy");
        let _ = updates
            .send(StatusUpdate::with_snapshot(
                DeployStatus::Done,
                "all services healthy",
                &snap,
            ))
            .await;
        DeployStatus::Done
    }
}
