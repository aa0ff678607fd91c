//! Tasks that bring a host to the point where kubeadm can bootstrap it

use crate::dispatch;
use crate::registry::Host;
use crate::runner::HostTask;
use crate::state::RunContext;
use async_trait::async_trait;
use kubeprep_core::{Error, Result, ResultExt, PROXY_AWARE_SERVICES};
use kubeprep_scripts as scripts;
use kubeprep_ssh::Connection;

/// Pre-pull control plane images for the target Kubernetes version
pub struct PullImages;

#[async_trait]
impl HostTask for PullImages {
    fn name(&self) -> &str {
        "pull images"
    }

    async fn run(&self, ctx: &RunContext, _host: &Host, conn: &dyn Connection) -> Result<()> {
        tracing::info!("Pre-pulling images");
        let vars = scripts::images_pull_variables(&ctx.cluster)?;
        conn.run(scripts::IMAGES_PULL, &vars).await?;
        Ok(())
    }
}

/// Proxy environment file and CA bundle, plus systemd drop-ins for the
/// runtime and kubelet when a proxy is set
pub struct SetupProxy;

#[async_trait]
impl HostTask for SetupProxy {
    fn name(&self) -> &str {
        "setup proxy"
    }

    async fn run(&self, ctx: &RunContext, _host: &Host, conn: &dyn Connection) -> Result<()> {
        tracing::info!("Creating environment file");
        conn.run_raw(&scripts::environment_file(&ctx.cluster)?)
            .await
            .context("failed to create environment file")?;

        if !ctx.cluster.proxy.is_configured() {
            return Ok(());
        }

        tracing::info!("Configuring docker/containerd/kubelet environment");
        conn.run_raw(&scripts::daemons_environment_drop_in(PROXY_AWARE_SERVICES)?)
            .await
            .context("failed to configure proxy for container runtime and kubelet")?;
        Ok(())
    }
}

pub struct InstallKubeadm;

#[async_trait]
impl HostTask for InstallKubeadm {
    fn name(&self) -> &str {
        "install kubeadm"
    }

    async fn run(&self, ctx: &RunContext, host: &Host, conn: &dyn Connection) -> Result<()> {
        dispatch::install_kubeadm(ctx, host, conn).await
    }
}

/// How the nm-cloud-setup reboot script ended
#[derive(Debug)]
pub enum RebootOutcome {
    /// The script returned before the host went down
    Completed,
    /// The connection dropped, as it does when the host reboots under it
    ExpectedDisconnect(Error),
}

impl RebootOutcome {
    pub fn classify(result: Result<kubeprep_ssh::CommandOutput>) -> Self {
        match result {
            Ok(_) => RebootOutcome::Completed,
            Err(cause) => RebootOutcome::ExpectedDisconnect(cause),
        }
    }
}

/// Disable nm-cloud-setup on RHEL family hosts that have not joined a
/// cluster yet, then wait out the reboot and drop the stale connection
pub struct DisableNmCloudSetup;

#[async_trait]
impl HostTask for DisableNmCloudSetup {
    fn name(&self) -> &str {
        "disable nm-cloud-setup"
    }

    async fn run(&self, ctx: &RunContext, host: &Host, conn: &dyn Connection) -> Result<()> {
        if !host.os().is_rhel_family() || host.initialized() {
            tracing::debug!("Skipping nm-cloud-setup");
            return Ok(());
        }

        let script = scripts::disable_nm_cloud_setup()?;
        tracing::info!("Disabling nm-cloud-setup, the host will be rebooted");
        match RebootOutcome::classify(conn.run_raw(&script).await) {
            RebootOutcome::Completed => tracing::debug!("nm-cloud-setup script completed"),
            RebootOutcome::ExpectedDisconnect(cause) => {
                tracing::debug!(cause = %cause, "Connection dropped by reboot")
            }
        }

        let grace = ctx.options.reboot_grace;
        tracing::info!(grace = ?grace, "Waiting for the host to boot");
        tokio::time::sleep(grace).await;

        // The old session does not survive the reboot; the next task reconnects.
        if let Err(e) = ctx.registry.close_connection(host.id()).await {
            tracing::warn!(error = %e, "Failed to close connection after reboot");
        }
        Ok(())
    }
}

/// Stage the bundle in the working directory, then install each file
pub struct UploadConfiguration;

#[async_trait]
impl HostTask for UploadConfiguration {
    fn name(&self) -> &str {
        "upload configuration"
    }

    async fn run(&self, ctx: &RunContext, _host: &Host, conn: &dyn Connection) -> Result<()> {
        let work_dir = ctx.options.work_dir.as_str();

        tracing::info!("Uploading config files");
        ctx.configuration()?
            .upload_to(conn, work_dir)
            .await
            .context("failed to upload")?;

        let installs = [
            scripts::save_cloud_config(work_dir)?,
            scripts::save_audit_policy_config(work_dir)?,
            scripts::save_pod_node_selector_config(work_dir)?,
            scripts::save_encryption_providers_config(
                work_dir,
                &ctx.encryption_provider_config_name(),
            )?,
        ];
        for script in &installs {
            conn.run_raw(script).await?;
        }
        Ok(())
    }
}
