//! Remote execution on the repository host.
//!
//! One `ssh` master connection is opened per process and every probe is
//! multiplexed over its control socket, so the host sees a single login for
//! the whole run.
//!
//! # Lifecycle
//! - [`SshSession::open`] authenticates and backgrounds the master. Failure
//!   here is fatal to the run.
//! - [`RemoteExec::run`] runs one command over the master, bounded by the
//!   configured timeout.
//! - [`SshSession::close`] asks the master to exit.

use crate::config::RepositoryConfig;
use crate::error::{Result, WatchError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

#[async_trait]
pub trait RemoteExec: Send + Sync {
    /// Run `command` on the repository host and return its stdout.
    async fn run(&self, command: &str) -> Result<String>;
}

pub struct SshSession {
    ssh: PathBuf,
    control_path: PathBuf,
    destination: String,
    port: u16,
    timeout: Duration,
}

impl SshSession {
    pub async fn open(config: &RepositoryConfig) -> Result<Self> {
        let ssh = which::which("ssh")
            .map_err(|e| WatchError::Transport(format!("ssh client not found: {e}")))?;
        let control_path =
            std::env::temp_dir().join(format!("idlewatch-{}.sock", std::process::id()));
        let session = Self {
            ssh,
            control_path,
            destination: format!("{}@{}", config.user, config.host),
            port: config.port,
            timeout: Duration::from_secs(config.command_timeout_secs),
        };

        // The backgrounded master keeps inherited descriptors open, so its
        // output cannot be piped and awaited.
        let mut cmd = session.base_command();
        cmd.args(["-M", "-f", "-N"])
            .args(["-o", "ControlPersist=yes"])
            .args(["-o", "StrictHostKeyChecking=accept-new"])
            .arg("-i")
            .arg(&config.private_key_path)
            .arg(&session.destination)
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let status = match tokio::time::timeout(session.timeout, cmd.status()).await {
            Ok(status) => status?,
            Err(_) => return Err(WatchError::Timeout(session.timeout.as_secs())),
        };
        if !status.success() {
            return Err(WatchError::Transport(format!(
                "could not connect to {} (ssh exit {})",
                session.destination,
                status.code().unwrap_or(-1)
            )));
        }
        tracing::info!(destination = %session.destination, "repository host session open");
        Ok(session)
    }

    pub async fn close(self) {
        let mut cmd = self.base_command();
        cmd.args(["-O", "exit"]).arg(&self.destination);
        match self.bounded(cmd).await {
            Ok(out) if out.status.success() => {
                tracing::debug!(destination = %self.destination, "repository host session closed")
            }
            Ok(out) => tracing::warn!(
                stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                "closing repository host session failed"
            ),
            Err(e) => tracing::warn!(error = %e, "closing repository host session failed"),
        }
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.ssh);
        cmd.arg("-S")
            .arg(&self.control_path)
            .args(["-o", "BatchMode=yes"])
            .arg("-p")
            .arg(self.port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn bounded(&self, mut cmd: Command) -> Result<std::process::Output> {
        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(out) => Ok(out?),
            Err(_) => Err(WatchError::Timeout(self.timeout.as_secs())),
        }
    }
}

#[async_trait]
impl RemoteExec for SshSession {
    async fn run(&self, command: &str) -> Result<String> {
        let mut cmd = self.base_command();
        cmd.arg(&self.destination).arg("--").arg(command);
        let output = self.bounded(cmd).await?;
        if !output.status.success() {
            return Err(WatchError::RemoteCommand(format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
