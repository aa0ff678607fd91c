use kubeprep_config::Cluster;
use kubeprep_core::{Result, TemplateVariables};

/// Pre-pull control plane images. Hosts without kubeadm skip quietly.
///
/// This runs before kubeadm is installed, so fresh hosts never pre-pull
/// (kubeadm pulls during bootstrap) and on an upgrade the kubeadm already on
/// the host pulls the images of the target version.
pub const IMAGES_PULL: &str = r#"set -xeuo pipefail
export "PATH=$PATH:/sbin:/usr/local/bin:/opt/bin"

if ! command -v kubeadm >/dev/null 2>&1; then
    echo "kubeadm is not installed, skipping image pull"
    exit 0
fi

sudo kubeadm config images pull --kubernetes-version {{ .KUBERNETES_VERSION }}
"#;

pub fn images_pull_variables(cluster: &Cluster) -> Result<TemplateVariables> {
    Ok(TemplateVariables::new().with("KUBERNETES_VERSION", cluster.versions.kubernetes_version()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeprep_core::render;

    #[test]
    fn renders_cluster_version() {
        let mut cluster = Cluster::default();
        cluster.versions.kubernetes = "v1.29.4".to_string();
        let vars = images_pull_variables(&cluster).unwrap();
        let script = render("images-pull", IMAGES_PULL, &vars).unwrap();
        assert!(script.contains("--kubernetes-version 1.29.4"));
        assert!(script.contains("command -v kubeadm"));
    }
}
