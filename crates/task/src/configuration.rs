//! The configuration bundle
//!
//! Files are generated once per run, before any host is touched, and then
//! uploaded to every host under the remote working directory. Install
//! scripts move them from there into their final locations.

use crate::state::RunContext;
use indexmap::IndexMap;
use kubeprep_core::{
    encryption_providers_config_path, Error, Result, ResultExt, ADMISSION_CONFIG_PATH,
    AUDIT_POLICY_PATH, CLOUD_CONFIG_PATH, POD_NODE_SELECTOR_CONFIG_PATH,
};
use kubeprep_ssh::Connection;
use kubeprep_templates::{new_admission_config, new_encryption_providers_config, to_yaml};
use std::path::{Path, PathBuf};

const STAGED_FILE_MODE: u32 = 0o600;

/// Where the content of a bundle entry comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Content(String),
    /// Read when the bundle is uploaded or written
    Path(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct Configuration {
    files: IndexMap<String, FileSource>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `content` under the relative `path`. A later add for the same
    /// path replaces the content but keeps the original position.
    pub fn add_file(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files
            .insert(path.into(), FileSource::Content(content.into()));
    }

    /// Add the local file `source` under `path`.
    ///
    /// Relative sources resolve against `manifest_dir`. The file must exist
    /// now even though it is only read at upload time.
    pub fn add_file_path(&mut self, path: impl Into<String>, source: &Path, manifest_dir: &Path) -> Result<()> {
        let resolved = if source.is_absolute() {
            source.to_path_buf()
        } else {
            manifest_dir.join(source)
        };

        let metadata = std::fs::metadata(&resolved)
            .map_err(|e| Error::file_system(&resolved, "read", e))?;
        if !metadata.is_file() {
            return Err(Error::configuration(format!(
                "'{}' is not a regular file",
                resolved.display()
            )));
        }

        self.files.insert(path.into(), FileSource::Path(resolved));
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&FileSource> {
        self.files.get(path)
    }

    /// Relative paths in insertion order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    async fn read(source: &FileSource) -> Result<Vec<u8>> {
        match source {
            FileSource::Content(content) => Ok(content.clone().into_bytes()),
            FileSource::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|e| Error::file_system(path, "read", e)),
        }
    }

    /// Write every entry below `work_dir` on the host behind `conn`
    pub async fn upload_to(&self, conn: &dyn Connection, work_dir: &str) -> Result<()> {
        for (path, source) in &self.files {
            let content = Self::read(source).await?;
            let remote = format!("{}/{path}", work_dir.trim_end_matches('/'));
            conn.upload(&remote, &content, STAGED_FILE_MODE)
                .await
                .with_context(|| format!("failed to upload {path}"))?;
        }
        Ok(())
    }

    /// Write every entry below a local directory
    pub async fn write_to(&self, dir: &Path) -> Result<()> {
        for (path, source) in &self.files {
            let content = Self::read(source).await?;
            let target = dir.join(path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::file_system(parent, "create directory", e))?;
            }
            tokio::fs::write(&target, content)
                .await
                .map_err(|e| Error::file_system(&target, "write", e))?;
        }
        Ok(())
    }
}

/// Build the bundle for this run from the cluster features and the facts
/// gathered on the control plane
pub fn generate_configuration_files(ctx: &RunContext) -> Result<Configuration> {
    let cluster = &ctx.cluster;
    let features = &cluster.features;
    let mut configuration = Configuration::new();

    configuration.add_file(CLOUD_CONFIG_PATH, cluster.cloud_provider.cloud_config.as_str());

    if let Some(audit) = features.static_audit_log.as_ref().filter(|f| f.enable) {
        configuration
            .add_file_path(AUDIT_POLICY_PATH, &audit.config.policy_file_path, &ctx.manifest_dir)
            .context("unable to add audit policy file")?;
    }

    if let Some(selector) = features.pod_node_selector.as_ref().filter(|f| f.enable) {
        let admission = new_admission_config(&cluster.versions, selector)
            .context("failed to generate admission configuration")?;
        configuration.add_file(ADMISSION_CONFIG_PATH, admission);
        configuration
            .add_file_path(
                POD_NODE_SELECTOR_CONFIG_PATH,
                &selector.config.config_file_path,
                &ctx.manifest_dir,
            )
            .context("unable to add pod node selector config file")?;
    }

    let should_enable = ctx.should_enable_encryption();
    if should_enable || ctx.encryption_enabled() {
        let path = encryption_providers_config_path(&ctx.encryption_provider_config_name());
        if let Some(custom) = features.custom_encryption_configuration() {
            configuration.add_file(path, custom);
        } else if should_enable {
            let generated = to_yaml(&new_encryption_providers_config())
                .context("failed to generate encryption providers configuration")?;
            configuration.add_file(path, generated);
        }
    }

    tracing::debug!(files = ?configuration.paths().collect::<Vec<_>>(), "Generated configuration files");
    Ok(configuration)
}
