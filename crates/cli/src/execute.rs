use crate::commands::{facts, generate, install, Commands};
use kubeprep_core::Result;
use kubeprep_task::RunOptions;
use std::time::Duration;

impl Commands {
    pub async fn execute(self) -> Result<()> {
        match self {
            Commands::Install {
                manifest,
                force_install,
                workdir,
                reboot_grace,
            } => {
                let options = RunOptions {
                    force_install,
                    work_dir: workdir,
                    reboot_grace: Duration::from_secs(reboot_grace),
                };
                install::execute(&manifest, options).await
            }
            Commands::Generate { manifest, output } => generate::execute(&manifest, &output).await,
            Commands::Facts { manifest } => facts::execute(&manifest).await,
        }
    }
}
