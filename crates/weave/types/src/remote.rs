//! Remote deployment target descriptor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How to authenticate the remote shell session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RemoteAuth {
    Password(String),
    KeyFile(PathBuf),
    /// Use the local ssh agent.
    Agent,
}

/// A remote host reachable over ssh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: RemoteAuth,
    /// Directory on the target that holds the deployed artifacts.
    pub deploy_dir: String,
}

impl RemoteTarget {
    pub fn new(host: impl Into<String>, user: impl Into<String>, auth: RemoteAuth) -> Self {
        let host = host.into();
        Self {
            deploy_dir: format!("weave-{host}").replace(['.', ':'], "-"),
            host,
            port: 22,
            user: user.into(),
            auth,
        }
    }

    /// Stable label identifying the target, used for job records and
    /// per-target locking.
    pub fn label(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_identifies_user_host_and_port() {
        let target = RemoteTarget::new("10.0.0.5", "ops", RemoteAuth::Agent);
        assert_eq!(target.label(), "ops@10.0.0.5:22");
        assert_eq!(target.deploy_dir, "weave-10-0-0-5");
    }
}
