use crate::configuration::Configuration;
use crate::registry::HostRegistry;
use kubeprep_config::Cluster;
use kubeprep_core::{
    Error, Result, DEFAULT_ENCRYPTION_PROVIDERS_CONFIG_NAME, DEFAULT_REBOOT_GRACE,
    DEFAULT_WORK_DIR,
};
use kubeprep_ssh::Connector;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Knobs of a single run, set from the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Reinstall kubeadm even when the requested version is present
    pub force_install: bool,
    /// Staging directory on the hosts, relative to the SSH user's home
    pub work_dir: String,
    /// How long to wait for a host to come back after a reboot
    pub reboot_grace: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            force_install: false,
            work_dir: DEFAULT_WORK_DIR.to_string(),
            reboot_grace: DEFAULT_REBOOT_GRACE,
        }
    }
}

/// Everything a task can see, shared by reference with every host execution
pub struct RunContext {
    pub cluster: Cluster,
    /// Directory of the cluster manifest; relative file references resolve against it
    pub manifest_dir: PathBuf,
    pub options: RunOptions,
    pub registry: HostRegistry,
    configuration: OnceCell<Configuration>,
}

impl RunContext {
    pub fn new(
        cluster: Cluster,
        manifest_dir: impl Into<PathBuf>,
        options: RunOptions,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let registry = HostRegistry::new(&cluster, connector);
        Self {
            cluster,
            manifest_dir: manifest_dir.into(),
            options,
            registry,
            configuration: OnceCell::new(),
        }
    }

    /// The generated bundle; an error before generation has run
    pub fn configuration(&self) -> Result<&Configuration> {
        self.configuration
            .get()
            .ok_or_else(|| Error::configuration("configuration files have not been generated"))
    }

    /// Publish the bundle. It can be published once per run.
    pub fn publish_configuration(&self, configuration: Configuration) -> Result<()> {
        self.configuration
            .set(configuration)
            .map_err(|_| Error::configuration("configuration files were already generated"))
    }

    /// Encryption at rest is requested but not yet active on the cluster
    pub fn should_enable_encryption(&self) -> bool {
        self.cluster.features.encryption_providers_enabled() && !self.encryption_enabled()
    }

    /// A control plane host already runs with an encryption providers configuration
    pub fn encryption_enabled(&self) -> bool {
        self.live_encryption_config_name().is_some()
    }

    /// Name under which the encryption configuration is staged and installed
    pub fn encryption_provider_config_name(&self) -> String {
        self.live_encryption_config_name()
            .unwrap_or(DEFAULT_ENCRYPTION_PROVIDERS_CONFIG_NAME)
            .to_string()
    }

    fn live_encryption_config_name(&self) -> Option<&str> {
        self.registry
            .control_plane()
            .find_map(|host| host.encryption_config())
    }
}
