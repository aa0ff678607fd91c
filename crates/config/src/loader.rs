//! Cluster manifest loader
//!
//! Reads the YAML manifest, assigns host roles, resolves file references
//! relative to the manifest's directory and validates the result. Loading
//! happens once at startup; everything downstream sees an immutable
//! [`Cluster`].

use crate::cluster::{Cluster, HostRole};
use kubeprep_core::{Error, Result, ResultExt};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// A loaded cluster manifest and where it came from
#[derive(Debug, Clone)]
pub struct Manifest {
    pub cluster: Cluster,
    pub path: PathBuf,
}

/// Loader for cluster manifests
pub struct ManifestLoader {
    path: PathBuf,
    validate: bool,
}

impl ManifestLoader {
    /// Create a loader for the manifest at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            validate: true,
        }
    }

    /// Skip validation, used when only inspecting a partial manifest
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Read, resolve and validate the manifest
    pub fn load(self) -> Result<Manifest> {
        let content = fs::read_to_string(&self.path)
            .map_err(|e| Error::file_system(&self.path, "read", e))?;
        let base_dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let cluster = parse_manifest(&content, &base_dir)
            .with_context(|| format!("failed to load manifest '{}'", self.path.display()))?;

        if self.validate {
            validate(&cluster)?;
        }

        tracing::debug!(
            manifest = %self.path.display(),
            cluster = %cluster.name,
            hosts = cluster.hosts().count(),
            "Loaded cluster manifest"
        );

        Ok(Manifest {
            cluster,
            path: self.path,
        })
    }
}

/// Parse manifest content, resolving relative paths against `base_dir`
pub fn parse_manifest(content: &str, base_dir: &Path) -> Result<Cluster> {
    let mut cluster: Cluster = serde_yaml::from_str(content)?;

    for host in &mut cluster.control_plane.hosts {
        host.role = HostRole::ControlPlane;
    }
    for host in &mut cluster.static_workers.hosts {
        host.role = HostRole::StaticWorker;
    }

    resolve_paths(&mut cluster, base_dir);
    Ok(cluster)
}

fn resolve_paths(cluster: &mut Cluster, base_dir: &Path) {
    let resolve = |path: &mut PathBuf| {
        if !path.as_os_str().is_empty() && path.is_relative() {
            *path = base_dir.join(&*path);
        }
    };

    if let Some(audit) = cluster.features.static_audit_log.as_mut() {
        resolve(&mut audit.config.policy_file_path);
    }
    if let Some(pns) = cluster.features.pod_node_selector.as_mut() {
        resolve(&mut pns.config.config_file_path);
    }
    for host in cluster
        .control_plane
        .hosts
        .iter_mut()
        .chain(cluster.static_workers.hosts.iter_mut())
    {
        if let Some(key) = host.ssh_private_key_file.as_mut() {
            resolve(key);
        }
    }
}

/// Check the invariants the pipeline relies on
pub fn validate(cluster: &Cluster) -> Result<()> {
    if cluster.control_plane.hosts.is_empty() {
        return Err(Error::configuration(
            "the manifest must list at least one control plane host",
        ));
    }

    cluster.versions.kubernetes_minor()?;

    let mut ids = HashSet::new();
    for host in cluster.hosts() {
        if host.public_address.trim().is_empty() {
            return Err(Error::configuration(format!(
                "host {} has no public address",
                host.id
            )));
        }
        if !ids.insert(host.id) {
            return Err(Error::configuration(format!(
                "host id {} is used more than once",
                host.id
            )));
        }
    }

    let features = &cluster.features;
    if let Some(audit) = features.static_audit_log.as_ref().filter(|f| f.enable) {
        if audit.config.policy_file_path.as_os_str().is_empty() {
            return Err(Error::configuration(
                "staticAuditLog is enabled but config.policyFilePath is empty",
            ));
        }
    }
    if let Some(pns) = features.pod_node_selector.as_ref().filter(|f| f.enable) {
        if pns.config.config_file_path.as_os_str().is_empty() {
            return Err(Error::configuration(
                "podNodeSelector is enabled but config.configFilePath is empty",
            ));
        }
    }

    Ok(())
}
