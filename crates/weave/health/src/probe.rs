//! Status probes.
//!
//! A [`StatusProbe`] turns one poll of a deployment target into a
//! transport-agnostic [`StatusSnapshot`]. The compose probe opens a fresh
//! ssh session per poll; no connection is assumed reliable across polls.

use crate::error::{HealthError, HealthResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::io::Read;
use std::net::TcpStream;
use std::sync::Mutex;
use tracing::debug;
use weave_types::{
    RemoteAuth, RemoteTarget, ServiceState, ServiceStatus, StatusSnapshot, LOG_TAIL_LINES,
};

/// One status poll of a deployment target.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn snapshot(&self) -> HealthResult<StatusSnapshot>;
}

/// Polls a remote compose deployment over ssh.
pub struct ComposeProbe {
    target: RemoteTarget,
}

impl ComposeProbe {
    pub fn new(target: RemoteTarget) -> Self {
        Self { target }
    }

    fn poll_blocking(target: &RemoteTarget) -> HealthResult<StatusSnapshot> {
        let session = open_session(target)?;
        let dir = &target.deploy_dir;

        // Defined-service count; unreadable config is a tolerated state,
        // not an error.
        let services_defined = exec(&session, &format!("cd {dir} && docker compose config --services 2>/dev/null | wc -l"))
            .ok()
            .and_then(|out| out.trim().parse::<usize>().ok())
            .filter(|n| *n > 0);

        let ps = exec(
            &session,
            &format!("cd {dir} && docker compose ps -a --format json"),
        )?;
        let services = parse_ps_lines(&ps);

        let logs = exec(
            &session,
            &format!("cd {dir} && docker compose logs --tail {LOG_TAIL_LINES} 2>&1"),
        )
        .unwrap_or_default();
        let mut log_tail: Vec<String> = logs
            .lines()
            .rev()
            .take(LOG_TAIL_LINES)
            .map(str::to_string)
            .collect();
        log_tail.reverse();

        debug!(
            reported = services.len(),
            defined = ?services_defined,
            "compose status polled"
        );
        Ok(StatusSnapshot {
            services,
            services_defined,
            log_tail,
        })
    }
}

#[async_trait]
impl StatusProbe for ComposeProbe {
    async fn snapshot(&self) -> HealthResult<StatusSnapshot> {
        let target = self.target.clone();
        tokio::task::spawn_blocking(move || Self::poll_blocking(&target))
            .await
            .map_err(|e| HealthError::Probe(e.to_string()))?
    }
}

/// One row of `docker compose ps --format json`.
#[derive(Debug, Deserialize)]
struct PsRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "Health", default)]
    health: String,
    #[serde(rename = "ExitCode", default)]
    exit_code: Option<i32>,
}

fn parse_ps_lines(out: &str) -> Vec<ServiceStatus> {
    out.lines()
        .filter_map(|line| serde_json::from_str::<PsRow>(line).ok())
        .map(|row| ServiceStatus {
            name: row.name,
            state: ServiceState::parse(&row.state),
            health: row.health,
            exit_code: row.exit_code,
        })
        .collect()
}

/// Open and authenticate a fresh ssh session.
fn open_session(target: &RemoteTarget) -> HealthResult<ssh2::Session> {
    let stream = TcpStream::connect(target.addr())?;
    let mut session = ssh2::Session::new()?;
    session.set_tcp_stream(stream);
    session.handshake()?;
    match &target.auth {
        RemoteAuth::Password(password) => {
            session.userauth_password(&target.user, password)?;
        }
        RemoteAuth::KeyFile(path) => {
            session.userauth_pubkey_file(&target.user, None, path, None)?;
        }
        RemoteAuth::Agent => {
            session.userauth_agent(&target.user)?;
        }
    }
    Ok(session)
}

fn exec(session: &ssh2::Session, command: &str) -> HealthResult<String> {
    let mut channel = session.channel_session()?;
    channel.exec(command)?;
    let mut out = String::new();
    channel.read_to_string(&mut out)?;
    channel.wait_close()?;
    Ok(out)
}

/// Test probe that replays a fixed sequence of snapshots, repeating the
/// last one once the script runs out.
pub struct ScriptedProbe {
    script: Mutex<Vec<StatusSnapshot>>,
    last: Mutex<Option<StatusSnapshot>>,
}

impl ScriptedProbe {
    pub fn new(snapshots: Vec<StatusSnapshot>) -> Self {
        let mut script = snapshots;
        script.reverse();
        Self {
            script: Mutex::new(script),
            last: Mutex::new(None),
        }
    }
}

#[async_trait]
impl StatusProbe for ScriptedProbe {
    async fn snapshot(&self) -> HealthResult<StatusSnapshot> {
        let next = self
            .script
            .lock()
            .map_err(|_| HealthError::Probe("scripted probe poisoned".to_string()))?
            .pop();
        let mut last = self
            .last
            .lock()
            .map_err(|_| HealthError::Probe("scripted probe poisoned".to_string()))?;
        match next {
            Some(snap) => {
                *last = Some(snap.clone());
                Ok(snap)
            }
            None => last
                .clone()
                .ok_or_else(|| HealthError::Probe("scripted probe exhausted".to_string())),
        }
    }
}
