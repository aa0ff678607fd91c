use kubeprep_core::Result;
use kubeprep_task::{HostFacts, Pipeline, PipelineState, RunOptions};
use std::path::Path;

pub async fn execute(manifest: &Path) -> Result<()> {
    let ctx = super::load_context(manifest, RunOptions::default())?;
    let pipeline = Pipeline::new(ctx.clone());

    let result = pipeline.run_states(&[PipelineState::GatherFacts]).await;
    ctx.registry.close_all().await;
    result?;

    for facts in HostFacts::collect(&ctx.registry) {
        println!("{facts}");
    }
    Ok(())
}
