use kubeprep_core::Result;
use kubeprep_task::{generate_configuration_files, RunOptions};
use std::path::Path;

/// Write the bundle as it would be uploaded to a fresh cluster.
///
/// Hosts are not contacted, so a live encryption configuration is never
/// detected here.
pub async fn execute(manifest: &Path, output: &Path) -> Result<()> {
    let ctx = super::load_context(manifest, RunOptions::default())?;
    let configuration = generate_configuration_files(&ctx)?;
    configuration.write_to(output).await?;

    for path in configuration.paths() {
        println!("{}", output.join(path).display());
    }
    tracing::info!(files = configuration.len(), output = %output.display(), "Configuration bundle written");
    Ok(())
}
