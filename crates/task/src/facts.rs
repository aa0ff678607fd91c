//! Observations made on every host before anything is changed

use crate::registry::{Host, HostRegistry};
use crate::runner::HostTask;
use crate::state::RunContext;
use async_trait::async_trait;
use kubeprep_config::HostRole;
use kubeprep_core::{OperatingSystem, Result, ResultExt};
use kubeprep_scripts as scripts;
use kubeprep_ssh::Connection;
use std::fmt;

/// Resolves the OS, the initialized state and, on control plane hosts, any
/// live encryption providers configuration
pub struct GatherFacts;

#[async_trait]
impl HostTask for GatherFacts {
    fn name(&self) -> &str {
        "gather facts"
    }

    async fn run(&self, _ctx: &RunContext, host: &Host, conn: &dyn Connection) -> Result<()> {
        if !host.os_resolved() {
            let release = conn
                .run_raw(&scripts::os_release())
                .await
                .context("failed to read os-release")?;
            host.set_os(OperatingSystem::from_os_release(&release.stdout))?;
        }

        let initialized = conn
            .run_raw(&scripts::kubelet_initialized())
            .await
            .context("failed to probe kubelet configuration")?;
        host.set_initialized(scripts::parse_initialized(&initialized.stdout))?;

        if host.config.is_control_plane() {
            let found = conn
                .run_raw(&scripts::encryption_providers_config_name())
                .await
                .context("failed to probe encryption providers configuration")?;
            host.set_encryption_config(scripts::parse_config_name(&found.stdout))?;
        }

        tracing::info!(
            os = %host.os(),
            initialized = host.initialized(),
            encryption_config = host.encryption_config().unwrap_or("-"),
            "Gathered host facts"
        );
        Ok(())
    }
}

/// Snapshot of what is known about one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFacts {
    pub id: u32,
    pub address: String,
    pub role: HostRole,
    pub os: OperatingSystem,
    pub initialized: bool,
    pub encryption_config: Option<String>,
}

impl HostFacts {
    pub fn collect(registry: &HostRegistry) -> Vec<HostFacts> {
        registry
            .hosts()
            .iter()
            .map(|host| HostFacts {
                id: host.id(),
                address: host.config.public_address.clone(),
                role: host.config.role,
                os: host.os(),
                initialized: host.initialized(),
                encryption_config: host.encryption_config().map(str::to_string),
            })
            .collect()
    }
}

impl fmt::Display for HostFacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            HostRole::ControlPlane => "control-plane",
            HostRole::StaticWorker => "worker",
        };
        write!(
            f,
            "{:<4} {:<16} {:<14} {:<8} initialized={}",
            self.id,
            self.address,
            role,
            self.os.as_str(),
            self.initialized
        )?;
        if let Some(name) = &self.encryption_config {
            write!(f, " encryption={name}")?;
        }
        Ok(())
    }
}
