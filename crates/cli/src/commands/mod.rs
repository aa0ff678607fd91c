use clap::Subcommand;
use kubeprep_config::ManifestLoader;
use kubeprep_core::{Result, DEFAULT_REBOOT_GRACE, DEFAULT_WORK_DIR};
use kubeprep_ssh::{SshConnector, SshOptions};
use kubeprep_task::{RunContext, RunOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod facts;
pub mod generate;
pub mod install;

#[derive(Subcommand)]
pub enum Commands {
    /// Install prerequisites on every host of the cluster
    Install {
        /// Path to the cluster manifest
        #[arg(short, long, value_name = "FILE")]
        manifest: PathBuf,

        /// Reinstall kubeadm even if the requested version is present
        #[arg(long)]
        force_install: bool,

        /// Staging directory on the hosts, relative to the SSH user's home
        #[arg(long, value_name = "DIR", default_value = DEFAULT_WORK_DIR)]
        workdir: String,

        /// Seconds to wait for a host to come back after a reboot
        #[arg(long, value_name = "SECS", default_value_t = DEFAULT_REBOOT_GRACE.as_secs())]
        reboot_grace: u64,
    },

    /// Write the configuration bundle to a local directory without touching hosts
    Generate {
        /// Path to the cluster manifest
        #[arg(short, long, value_name = "FILE")]
        manifest: PathBuf,

        /// Directory to write the bundle into
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,
    },

    /// Print what kubeprep detects on each host
    Facts {
        /// Path to the cluster manifest
        #[arg(short, long, value_name = "FILE")]
        manifest: PathBuf,
    },
}

/// Load the manifest and build the context shared by every task of the run
pub(crate) fn load_context(manifest: &Path, options: RunOptions) -> Result<Arc<RunContext>> {
    let manifest = ManifestLoader::new(manifest).load()?;
    let manifest_dir = manifest
        .path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let connector = SshConnector::new(SshOptions::default())?;

    Ok(Arc::new(RunContext::new(
        manifest.cluster,
        manifest_dir,
        options,
        Arc::new(connector),
    )))
}
