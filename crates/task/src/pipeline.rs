//! The prerequisite pipeline
//!
//! States run in a fixed order. The first failing state ends the run and
//! its error names the state; later states are never entered.

use crate::configuration::generate_configuration_files;
use crate::facts::GatherFacts;
use crate::prerequisites::{
    DisableNmCloudSetup, InstallKubeadm, PullImages, SetupProxy, UploadConfiguration,
};
use crate::runner::{run_on_all_hosts, RunMode};
use crate::state::RunContext;
use kubeprep_core::{Error, Result};
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    GatherFacts,
    PullImages,
    GenerateConfig,
    SetupProxy,
    InstallKubeadm,
    DisableNmCloudSetup,
    UploadConfig,
}

impl PipelineState {
    /// Every state, in execution order
    pub const ALL: [PipelineState; 7] = [
        PipelineState::GatherFacts,
        PipelineState::PullImages,
        PipelineState::GenerateConfig,
        PipelineState::SetupProxy,
        PipelineState::InstallKubeadm,
        PipelineState::DisableNmCloudSetup,
        PipelineState::UploadConfig,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::GatherFacts => "gather-facts",
            PipelineState::PullImages => "pull-images",
            PipelineState::GenerateConfig => "generate-config",
            PipelineState::SetupProxy => "setup-proxy",
            PipelineState::InstallKubeadm => "install-kubeadm",
            PipelineState::DisableNmCloudSetup => "disable-nm-cloud-setup",
            PipelineState::UploadConfig => "upload-config",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Pipeline {
    ctx: Arc<RunContext>,
}

impl Pipeline {
    pub fn new(ctx: Arc<RunContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<RunContext> {
        &self.ctx
    }

    /// Run every state, then close all connections whatever the outcome
    pub async fn run(&self) -> Result<()> {
        tracing::info!(hosts = self.ctx.registry.hosts().len(), "Installing prerequisites");
        let result = self.run_states(&PipelineState::ALL).await;
        self.ctx.registry.close_all().await;
        if result.is_ok() {
            tracing::info!("Prerequisites installed");
        }
        result
    }

    /// Run the given states in order, stopping at the first failure
    pub async fn run_states(&self, states: &[PipelineState]) -> Result<()> {
        for &state in states {
            let span = tracing::info_span!("state", state = state.as_str());
            self.run_state(state)
                .instrument(span)
                .await
                .map_err(|e| Error::state(state.as_str(), e))?;
        }
        Ok(())
    }

    async fn run_state(&self, state: PipelineState) -> Result<()> {
        let ctx = &self.ctx;
        match state {
            PipelineState::GatherFacts => {
                run_on_all_hosts(ctx, Arc::new(GatherFacts), RunMode::Concurrent).await
            }
            PipelineState::PullImages => {
                run_on_all_hosts(ctx, Arc::new(PullImages), RunMode::Concurrent).await
            }
            PipelineState::GenerateConfig => {
                let configuration = generate_configuration_files(ctx)?;
                ctx.publish_configuration(configuration)
            }
            PipelineState::SetupProxy => {
                if !ctx.cluster.proxy.is_configured() && !ctx.cluster.has_ca_bundle() {
                    tracing::debug!("No proxy or CA bundle configured, skipping");
                    return Ok(());
                }
                run_on_all_hosts(ctx, Arc::new(SetupProxy), RunMode::Concurrent).await
            }
            PipelineState::InstallKubeadm => {
                run_on_all_hosts(ctx, Arc::new(InstallKubeadm), RunMode::Concurrent).await
            }
            PipelineState::DisableNmCloudSetup => {
                run_on_all_hosts(ctx, Arc::new(DisableNmCloudSetup), RunMode::Sequential).await
            }
            PipelineState::UploadConfig => {
                run_on_all_hosts(ctx, Arc::new(UploadConfiguration), RunMode::Concurrent).await
            }
        }
    }
}
