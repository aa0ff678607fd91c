#![allow(dead_code)]

use kubeprep_config::{Cluster, HostConfig, HostRole, Proxy};
use kubeprep_core::OperatingSystem;
use kubeprep_ssh::testing::FakeConnector;
use kubeprep_task::{RunContext, RunOptions};
use std::path::Path;
use std::sync::Arc;

pub fn control_plane(id: u32, os: OperatingSystem) -> HostConfig {
    HostConfig::new(id, format!("10.0.0.{id}")).with_os(os)
}

pub fn worker(id: u32, os: OperatingSystem) -> HostConfig {
    control_plane(id, os).with_role(HostRole::StaticWorker)
}

pub fn cluster(control_plane: Vec<HostConfig>, workers: Vec<HostConfig>) -> Cluster {
    let mut cluster = Cluster {
        name: "test".to_string(),
        ..Cluster::default()
    };
    cluster.versions.kubernetes = "1.29.4".to_string();
    cluster.cloud_provider.cloud_config = "[Global]\nregion = eu-west-1\n".to_string();
    cluster.control_plane.hosts = control_plane;
    cluster.static_workers.hosts = workers;
    cluster
}

/// Ubuntu and RHEL control plane, Flatcar worker
pub fn three_host_cluster() -> Cluster {
    cluster(
        vec![
            control_plane(1, OperatingSystem::Ubuntu),
            control_plane(2, OperatingSystem::Rhel),
        ],
        vec![worker(3, OperatingSystem::Flatcar)],
    )
}

pub fn with_proxy(mut cluster: Cluster) -> Cluster {
    cluster.proxy = Proxy {
        http: "http://proxy.internal:3128".to_string(),
        https: "http://proxy.internal:3128".to_string(),
        no_proxy: "10.0.0.0/8".to_string(),
    };
    cluster
}

pub fn context(cluster: Cluster, fake: &FakeConnector) -> Arc<RunContext> {
    context_in(cluster, fake, Path::new("."))
}

pub fn context_in(cluster: Cluster, fake: &FakeConnector, manifest_dir: &Path) -> Arc<RunContext> {
    Arc::new(RunContext::new(
        cluster,
        manifest_dir,
        RunOptions::default(),
        Arc::new(fake.clone()),
    ))
}

/// Position of the first script on `host` containing `needle`
pub fn script_index(fake: &FakeConnector, host: u32, needle: &str) -> Option<usize> {
    fake.scripts(host).iter().position(|s| s.contains(needle))
}
