//! Fleet task orchestration for kubeprep
//!
//! This crate runs named tasks across the hosts of a cluster, sequentially
//! or concurrently, dispatches installation procedures by operating system,
//! builds and distributes the configuration bundle, and drives the
//! prerequisite pipeline from fact gathering to config upload.

pub mod configuration;
pub mod dispatch;
pub mod facts;
pub mod pipeline;
pub mod prerequisites;
pub mod registry;
pub mod runner;
pub mod state;

pub use configuration::{generate_configuration_files, Configuration, FileSource};
pub use dispatch::{install_kubeadm, procedure_for, InstallProcedure};
pub use facts::{GatherFacts, HostFacts};
pub use pipeline::{Pipeline, PipelineState};
pub use prerequisites::{
    DisableNmCloudSetup, InstallKubeadm, PullImages, RebootOutcome, SetupProxy,
    UploadConfiguration,
};
pub use registry::{Host, HostRegistry};
pub use runner::{run_on_all_hosts, run_on_hosts, HostTask, RunMode};
pub use state::{RunContext, RunOptions};
