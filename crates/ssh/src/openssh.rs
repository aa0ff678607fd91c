//! Connections through the system OpenSSH client
//!
//! Each host gets a control master (`ControlMaster`/`ControlPath`) so every
//! command of a run is multiplexed over one authenticated channel. Closing a
//! connection asks the master to exit; the next connect starts a new one,
//! which is what makes reconnecting after a reboot work.

use crate::connection::{CommandOutput, Connection, Connector};
use async_trait::async_trait;
use kubeprep_config::HostConfig;
use kubeprep_core::{Error, Result, DEFAULT_SSH_CONNECT_TIMEOUT_SECS};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// OpenSSH exits with 255 when the failure is its own rather than the command's
const SSH_TRANSPORT_EXIT_CODE: i32 = 255;

/// Options shared by every SSH connection of a run
#[derive(Debug, Clone)]
pub struct SshOptions {
    /// The `ssh` binary to invoke
    pub binary: PathBuf,
    pub connect_timeout: Duration,
    pub strict_host_key_checking: bool,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ssh"),
            connect_timeout: Duration::from_secs(DEFAULT_SSH_CONNECT_TIMEOUT_SECS),
            strict_host_key_checking: false,
        }
    }
}

/// Connector backed by the system `ssh` client
pub struct SshConnector {
    options: SshOptions,
    control_dir: TempDir,
}

impl SshConnector {
    pub fn new(options: SshOptions) -> Result<Self> {
        let control_dir = tempfile::Builder::new()
            .prefix("kubeprep-ssh")
            .tempdir()
            .map_err(|e| Error::file_system(std::env::temp_dir(), "create control directory", e))?;
        Ok(Self {
            options,
            control_dir,
        })
    }

    fn control_path(&self, host: &HostConfig) -> PathBuf {
        self.control_dir.path().join(format!("{}.sock", host.id))
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, host: &HostConfig) -> Result<Arc<dyn Connection>> {
        let control_path = self.control_path(host);
        let destination = format!("{}@{}", host.ssh_username, host.public_address);
        let base_args = base_args(&self.options, host, &control_path);

        tracing::debug!(host = %host.identity(), "Opening SSH control master");

        let output = Command::new(&self.options.binary)
            .args(&base_args)
            .args(["-o", "ControlMaster=yes", "-o", "ControlPersist=yes", "-f", "-N"])
            .arg(&destination)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::transport("ssh", format!("failed to spawn ssh: {e}")))?;

        if !output.status.success() {
            return Err(Error::transport(
                format!("ssh {destination}"),
                format!(
                    "failed to connect: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        Ok(Arc::new(SshConnection {
            binary: self.options.binary.clone(),
            base_args,
            destination,
            closed: AtomicBool::new(false),
        }))
    }
}

fn base_args(options: &SshOptions, host: &HostConfig, control_path: &Path) -> Vec<String> {
    let mut args = vec![
        "-p".to_string(),
        host.ssh_port.to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", options.connect_timeout.as_secs()),
        "-o".to_string(),
        format!(
            "StrictHostKeyChecking={}",
            if options.strict_host_key_checking { "yes" } else { "no" }
        ),
        "-o".to_string(),
        format!("ControlPath={}", control_path.display()),
    ];
    if let Some(key) = &host.ssh_private_key_file {
        args.push("-i".to_string());
        args.push(key.display().to_string());
    }
    args
}

/// One multiplexed SSH channel
pub struct SshConnection {
    binary: PathBuf,
    base_args: Vec<String>,
    destination: String,
    closed: AtomicBool,
}

impl SshConnection {
    async fn exec(&self, remote_command: &str, stdin: &[u8]) -> Result<CommandOutput> {
        if self.is_closed() {
            return Err(Error::transport(remote_command, "connection is closed"));
        }

        let mut child = Command::new(&self.binary)
            .args(&self.base_args)
            .arg(&self.destination)
            .arg(remote_command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::transport(remote_command, format!("failed to spawn ssh: {e}")))?;

        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(stdin)
                .await
                .map_err(|e| Error::transport(remote_command, format!("failed to write stdin: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::transport(remote_command, e.to_string()))?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        match result.exit_code {
            0 => Ok(result),
            SSH_TRANSPORT_EXIT_CODE | -1 => {
                // The master is gone; this handle can't be reused.
                self.closed.store(true, Ordering::SeqCst);
                Err(Error::transport(remote_command, result.stderr.trim().to_string()))
            }
            code => Err(Error::command_failed(remote_command, code, result.stderr)),
        }
    }
}

#[async_trait]
impl Connection for SshConnection {
    async fn run_raw(&self, script: &str) -> Result<CommandOutput> {
        self.exec("bash -s", script.as_bytes())
            .await
            .map_err(|e| match e {
                // Report the script rather than the `bash -s` wrapper.
                Error::Transport {
                    message,
                    exit_code,
                    stderr,
                    ..
                } => Error::Transport {
                    command: script.to_string(),
                    message,
                    exit_code,
                    stderr,
                },
                other => other,
            })
    }

    async fn upload(&self, path: &str, content: &[u8], mode: u32) -> Result<()> {
        let quoted = shlex::try_quote(path)
            .map_err(|e| Error::configuration(format!("cannot quote remote path '{path}': {e}")))?;
        let command = format!(
            "mkdir -p \"$(dirname {quoted})\" && cat > {quoted} && chmod {mode:o} {quoted}"
        );
        self.exec(&command, content).await.map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let status = Command::new(&self.binary)
            .args(&self.base_args)
            .args(["-O", "exit"])
            .arg(&self.destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        if let Err(e) = status {
            tracing::debug!(destination = %self.destination, error = %e, "Failed to stop SSH control master");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
