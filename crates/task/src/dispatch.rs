use crate::registry::Host;
use crate::state::RunContext;
use kubeprep_config::Cluster;
use kubeprep_core::{Error, OperatingSystem, Result, ResultExt};
use kubeprep_ssh::Connection;
use std::fmt;

/// The kubeadm installation procedure for one family of distributions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallProcedure {
    Debian,
    CentOS,
    AmazonLinux,
    Flatcar,
}

impl InstallProcedure {
    pub fn name(self) -> &'static str {
        match self {
            InstallProcedure::Debian => "debian",
            InstallProcedure::CentOS => "centos",
            InstallProcedure::AmazonLinux => "amazon linux",
            InstallProcedure::Flatcar => "flatcar",
        }
    }

    pub fn script(self, cluster: &Cluster, force: bool) -> Result<String> {
        match self {
            InstallProcedure::Debian => kubeprep_scripts::kubeadm_debian(cluster, force),
            InstallProcedure::CentOS => kubeprep_scripts::kubeadm_centos(cluster, force),
            InstallProcedure::AmazonLinux => kubeprep_scripts::kubeadm_amazon_linux(cluster, force),
            InstallProcedure::Flatcar => kubeprep_scripts::kubeadm_flatcar(cluster, force),
        }
    }
}

impl fmt::Display for InstallProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn procedure_for(os: OperatingSystem) -> Result<InstallProcedure> {
    match os {
        OperatingSystem::Debian | OperatingSystem::Ubuntu => Ok(InstallProcedure::Debian),
        OperatingSystem::CentOS | OperatingSystem::Rhel => Ok(InstallProcedure::CentOS),
        OperatingSystem::AmazonLinux => Ok(InstallProcedure::AmazonLinux),
        OperatingSystem::Flatcar => Ok(InstallProcedure::Flatcar),
        OperatingSystem::Unknown => Err(Error::unsupported_os(os)),
    }
}

/// Install kubeadm, kubelet and the container runtime using the procedure
/// mapped to the host's operating system
pub async fn install_kubeadm(ctx: &RunContext, host: &Host, conn: &dyn Connection) -> Result<()> {
    let procedure = procedure_for(host.os())?;
    let script = procedure.script(&ctx.cluster, ctx.options.force_install)?;

    tracing::info!(procedure = %procedure, "Installing kubeadm");
    conn.run_raw(&script)
        .await
        .with_context(|| format!("{procedure} kubeadm installation failed"))?;
    Ok(())
}
