//! Cluster manifest model
//!
//! The manifest is immutable once loaded and is shared by every task in a
//! run. Field names follow the camelCase convention of Kubernetes manifests.

use kubeprep_core::{
    Error, OperatingSystem, Result, DEFAULT_SSH_PORT, DEFAULT_SSH_USER,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cluster {
    pub name: String,
    pub versions: Versions,
    pub container_runtime: ContainerRuntime,
    pub cloud_provider: CloudProvider,
    pub proxy: Proxy,
    /// PEM bundle distributed to hosts that sit behind an intercepting proxy
    pub ca_bundle: String,
    pub features: Features,
    pub control_plane: HostGroup,
    pub static_workers: HostGroup,
}

impl Cluster {
    /// True when a non-blank CA bundle is configured
    pub fn has_ca_bundle(&self) -> bool {
        !self.ca_bundle.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Versions {
    pub kubernetes: String,
}

impl Versions {
    /// `(major, minor)` of the requested Kubernetes version
    pub fn kubernetes_minor(&self) -> Result<(u32, u32)> {
        let version = self.kubernetes.trim().trim_start_matches('v');
        let mut parts = version.split('.');
        let parse = |part: Option<&str>| -> Result<u32> {
            part.and_then(|p| p.parse().ok()).ok_or_else(|| {
                Error::configuration(format!(
                    "invalid Kubernetes version '{}', expected MAJOR.MINOR.PATCH",
                    self.kubernetes
                ))
            })
        };
        let major = parse(parts.next())?;
        let minor = parse(parts.next())?;
        Ok((major, minor))
    }

    /// Package stream of the requested version, e.g. `1.29`
    pub fn kubernetes_stream(&self) -> Result<String> {
        let (major, minor) = self.kubernetes_minor()?;
        Ok(format!("{major}.{minor}"))
    }

    /// Version without a leading `v`
    pub fn kubernetes_version(&self) -> &str {
        self.kubernetes.trim().trim_start_matches('v')
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    #[default]
    Containerd,
    Docker,
}

impl fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerRuntime::Containerd => f.write_str("containerd"),
            ContainerRuntime::Docker => f.write_str("docker"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudProvider {
    pub name: String,
    pub cloud_config: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Proxy {
    pub http: String,
    pub https: String,
    pub no_proxy: String,
}

impl Proxy {
    /// True when at least one proxy variable is set
    pub fn is_configured(&self) -> bool {
        !(self.http.is_empty() && self.https.is_empty() && self.no_proxy.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Features {
    pub static_audit_log: Option<StaticAuditLog>,
    pub pod_node_selector: Option<PodNodeSelector>,
    pub encryption_providers: Option<EncryptionProviders>,
}

impl Features {
    pub fn static_audit_log_enabled(&self) -> bool {
        self.static_audit_log.as_ref().is_some_and(|f| f.enable)
    }

    pub fn pod_node_selector_enabled(&self) -> bool {
        self.pod_node_selector.as_ref().is_some_and(|f| f.enable)
    }

    pub fn encryption_providers_enabled(&self) -> bool {
        self.encryption_providers.as_ref().is_some_and(|f| f.enable)
    }

    /// User supplied EncryptionConfiguration, if any
    pub fn custom_encryption_configuration(&self) -> Option<&str> {
        self.encryption_providers
            .as_ref()
            .map(|f| f.custom_encryption_configuration.as_str())
            .filter(|c| !c.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaticAuditLog {
    pub enable: bool,
    pub config: StaticAuditLogConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaticAuditLogConfig {
    pub policy_file_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodNodeSelector {
    pub enable: bool,
    pub config: PodNodeSelectorConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodNodeSelectorConfig {
    pub config_file_path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncryptionProviders {
    pub enable: bool,
    pub custom_encryption_configuration: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostGroup {
    pub hosts: Vec<HostConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostRole {
    #[default]
    ControlPlane,
    StaticWorker,
}

/// One machine as declared in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    #[serde(default)]
    pub id: u32,
    pub public_address: String,
    #[serde(default)]
    pub private_address: Option<String>,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default = "default_ssh_username")]
    pub ssh_username: String,
    #[serde(default)]
    pub ssh_private_key_file: Option<PathBuf>,
    #[serde(default)]
    pub hostname: Option<String>,
    /// When unset the OS is detected from `/etc/os-release`
    #[serde(default)]
    pub operating_system: OperatingSystem,
    /// Assigned by the loader from the group the host is listed in
    #[serde(skip)]
    pub role: HostRole,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_ssh_username() -> String {
    DEFAULT_SSH_USER.to_string()
}

impl HostConfig {
    /// Minimal host, mostly useful for tests and ad-hoc inventories
    pub fn new(id: u32, public_address: impl Into<String>) -> Self {
        Self {
            id,
            public_address: public_address.into(),
            private_address: None,
            ssh_port: DEFAULT_SSH_PORT,
            ssh_username: DEFAULT_SSH_USER.to_string(),
            ssh_private_key_file: None,
            hostname: None,
            operating_system: OperatingSystem::Unknown,
            role: HostRole::ControlPlane,
        }
    }

    #[must_use]
    pub fn with_os(mut self, os: OperatingSystem) -> Self {
        self.operating_system = os;
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: HostRole) -> Self {
        self.role = role;
        self
    }

    /// Identity used in logs and errors: `<id>/<address>`
    pub fn identity(&self) -> String {
        format!("{}/{}", self.id, self.public_address)
    }

    pub fn is_control_plane(&self) -> bool {
        self.role == HostRole::ControlPlane
    }
}

impl Cluster {
    /// All hosts in registry order: control plane first, then static workers
    pub fn hosts(&self) -> impl Iterator<Item = &HostConfig> {
        self.control_plane
            .hosts
            .iter()
            .chain(self.static_workers.hosts.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kubernetes_stream() {
        let versions = Versions {
            kubernetes: "v1.29.4".to_string(),
        };
        assert_eq!(versions.kubernetes_minor().unwrap(), (1, 29));
        assert_eq!(versions.kubernetes_stream().unwrap(), "1.29");
        assert_eq!(versions.kubernetes_version(), "1.29.4");

        let broken = Versions {
            kubernetes: "latest".to_string(),
        };
        assert!(broken.kubernetes_minor().is_err());
    }

    #[test]
    fn proxy_configured_when_any_variable_is_set() {
        assert!(!Proxy::default().is_configured());
        let proxy = Proxy {
            no_proxy: "10.0.0.0/8".to_string(),
            ..Proxy::default()
        };
        assert!(proxy.is_configured());
    }

    #[test]
    fn blank_custom_encryption_configuration_counts_as_absent() {
        let features = Features {
            encryption_providers: Some(EncryptionProviders {
                enable: true,
                custom_encryption_configuration: "  \n".to_string(),
            }),
            ..Features::default()
        };
        assert!(features.encryption_providers_enabled());
        assert!(features.custom_encryption_configuration().is_none());
    }
}
