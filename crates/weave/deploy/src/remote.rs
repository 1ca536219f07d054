//! Remote-host transport.
//!
//! Uploads the staged archive over ssh, tears down any previous
//! deployment under the same directory, extracts the new artifacts, and
//! issues a detached start command. The start command's exit status is
//! not a success signal; readiness is owned by the health watcher.

use crate::bundle::{Bundle, ARCHIVE_NAME};
use crate::error::{DeployError, DeployResult};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};
use weave_types::{DeployStatus, RemoteAuth, RemoteTarget, StatusUpdate};

/// Deploys one bundle to one remote host.
pub struct RemoteTransport {
    target: RemoteTarget,
}

impl RemoteTransport {
    pub fn new(target: RemoteTarget) -> Self {
        Self { target }
    }

    /// Run the upload/extract/start sequence, reporting each phase.
    #[instrument(skip(self, bundle, updates), fields(target = %self.target.label()))]
    pub async fn deploy(
        &self,
        bundle: &Bundle,
        updates: &mpsc::Sender<StatusUpdate>,
    ) -> DeployResult<()> {
        let target = self.target.clone();
        let archive = tokio::fs::read(bundle.archive_path()).await?;
        let tx = updates.clone();
        tokio::task::spawn_blocking(move || deploy_blocking(&target, &archive, &tx))
            .await
            .map_err(|e| DeployError::Api(e.to_string()))?
    }
}

fn deploy_blocking(
    target: &RemoteTarget,
    archive: &[u8],
    updates: &mpsc::Sender<StatusUpdate>,
) -> DeployResult<()> {
    let _ = updates.blocking_send(StatusUpdate::new(
        DeployStatus::Preparing,
        format!("connecting to {}", target.label()),
    ));
    let session = open_session(target)?;

    // 1. Upload the archive.
    let remote_archive = format!("/tmp/{ARCHIVE_NAME}");
    upload(&session, &remote_archive, archive)?;
    debug!(bytes = archive.len(), "archive uploaded");

    // 2. Tear down any previous deployment under the same directory.
    //    Failures here are expected on a clean host.
    let dir = &target.deploy_dir;
    let _ = exec(
        &session,
        &format!("cd {dir} && docker compose down --remove-orphans 2>&1 && docker system prune -f 2>&1"),
    );
    let _ = exec(&session, &format!("rm -rf {dir}"));

    // 3. Extract the new artifacts.
    let _ = updates.blocking_send(StatusUpdate::new(
        DeployStatus::Extracting,
        "extracting artifacts",
    ));
    let (out, status) = exec(
        &session,
        &format!("mkdir -p {dir} && tar -xzf {remote_archive} -C {dir} 2>&1 && rm -f {remote_archive}"),
    )?;
    if status != 0 {
        return Err(DeployError::Extraction(out.trim().to_string()));
    }

    // 4. Detached start; its exit status is not a success signal.
    let _ = updates.blocking_send(StatusUpdate::new(
        DeployStatus::Starting,
        "starting services",
    ));
    let _ = exec(
        &session,
        &format!("cd {dir} && (nohup docker compose up -d > compose.log 2>&1 &); sleep 0.1"),
    );

    info!(target = %target.label(), "deployment started");
    Ok(())
}

/// Open and authenticate a fresh ssh session; an unreachable target is a
/// fatal connectivity error.
fn open_session(target: &RemoteTarget) -> DeployResult<ssh2::Session> {
    let stream = TcpStream::connect(target.addr())
        .map_err(|e| DeployError::Connectivity(format!("{}: {e}", target.addr())))?;
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

fn upload(session: &ssh2::Session, remote_path: &str, data: &[u8]) -> DeployResult<()> {
    let mut remote = session.scp_send(Path::new(remote_path), 0o644, data.len() as u64, None)?;
    remote.write_all(data)?;
    remote.send_eof()?;
    remote.wait_eof()?;
    remote.close()?;
    remote.wait_close()?;
    Ok(())
}

/// Run one command, returning combined output and exit status.
fn exec(session: &ssh2::Session, command: &str) -> DeployResult<(String, i32)> {
    let mut channel = session.channel_session()?;
    channel.exec(command)?;
    let mut out = String::new();
    channel.read_to_string(&mut out)?;
    channel.wait_close()?;
    Ok((out, channel.exit_status()?))
}
