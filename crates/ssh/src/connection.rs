use async_trait::async_trait;
use kubeprep_config::HostConfig;
use kubeprep_core::{render, Result, TemplateVariables};
use std::sync::Arc;

/// Captured result of a remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }
}

/// An open channel to a single host
///
/// A connection belongs to exactly one host. Once closed it rejects every
/// further command; callers must obtain a fresh connection instead.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Render `command` with `variables` and execute it
    async fn run(&self, command: &str, variables: &TemplateVariables) -> Result<CommandOutput> {
        let rendered = render("command", command, variables)?;
        self.run_raw(&rendered).await
    }

    /// Execute a multi-line script through `bash` on the host.
    ///
    /// A non-zero exit status is returned as an error carrying stderr.
    async fn run_raw(&self, script: &str) -> Result<CommandOutput>;

    /// Write `content` to `path` on the host, creating parent directories.
    ///
    /// Relative paths are relative to the login user's home directory.
    async fn upload(&self, path: &str, content: &[u8], mode: u32) -> Result<()>;

    /// Close the channel
    async fn close(&self) -> Result<()>;

    /// Whether `close` has been called or the transport has gone away
    fn is_closed(&self) -> bool;
}

/// Opens connections to hosts
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &HostConfig) -> Result<Arc<dyn Connection>>;
}
