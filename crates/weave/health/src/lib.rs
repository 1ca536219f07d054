//! Deployment readiness and health supervision for Weave.
//!
//! A deployment's start command is fire-and-forget; actual success is
//! only knowable by polling the target. This crate owns that loop: a
//! [`StatusProbe`] per transport produces transport-agnostic snapshots,
//! pure classification rules turn a snapshot into a verdict, and the
//! [`HealthWatcher`] drives polling, the settle delay, and the
//! confirmatory re-poll until the deployment is Done or Error.

#![deny(unsafe_code)]

pub mod classify;
pub mod error;
pub mod probe;
pub mod watcher;

pub use classify::{classify, is_expected_completed, Verdict, EXPECTED_COMPLETED_ROLES};
pub use error::{HealthError, HealthResult};
pub use probe::{ComposeProbe, ScriptedProbe, StatusProbe};
pub use watcher::{HealthWatcher, WatcherConfig};
