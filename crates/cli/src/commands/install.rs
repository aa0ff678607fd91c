use kubeprep_core::Result;
use kubeprep_task::{Pipeline, RunOptions};
use std::path::Path;

pub async fn execute(manifest: &Path, options: RunOptions) -> Result<()> {
    let ctx = super::load_context(manifest, options)?;
    Pipeline::new(ctx).run().await
}
