/// Constants used throughout the kubeprep codebase
use std::time::Duration;

// Environment variable names
pub const KUBEPREP_LOG_VAR: &str = "KUBEPREP_LOG";

// Remote working directory, relative to the SSH user's home
pub const DEFAULT_WORK_DIR: &str = "kubeprep";

// Time given to a host to come back after the nm-cloud-setup reboot
pub const DEFAULT_REBOOT_GRACE: Duration = Duration::from_secs(60);

// Defaults for hosts listed in the cluster manifest
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_SSH_USER: &str = "root";
pub const DEFAULT_SSH_CONNECT_TIMEOUT_SECS: u64 = 30;

// Bundle paths, relative to the remote working directory
pub const CLOUD_CONFIG_PATH: &str = "cfg/cloud-config";
pub const AUDIT_POLICY_PATH: &str = "cfg/audit-policy.yaml";
pub const ADMISSION_CONFIG_PATH: &str = "cfg/admission-config.yaml";
pub const POD_NODE_SELECTOR_CONFIG_PATH: &str = "cfg/podnodeselector.yaml";
pub const DEFAULT_ENCRYPTION_PROVIDERS_CONFIG_NAME: &str = "encryption-providers.yaml";

// Final locations on the host
pub const KUBERNETES_CONFIG_DIR: &str = "/etc/kubernetes";
pub const CLOUD_CONFIG_TARGET: &str = "/etc/kubernetes/cloud-config";
pub const AUDIT_POLICY_DIR: &str = "/etc/kubernetes/audit";
pub const ADMISSION_CONFIG_DIR: &str = "/etc/kubernetes/admission";
pub const ENCRYPTION_PROVIDERS_DIR: &str = "/etc/kubernetes/encryption-providers";
pub const KUBELET_KUBECONFIG: &str = "/etc/kubernetes/kubelet.conf";

// Proxy environment
pub const PROXY_ENV_FILE: &str = "/etc/kubeprep/proxy.env";
pub const PROXY_DROP_IN_NAME: &str = "http-proxy.conf";
pub const PROXY_AWARE_SERVICES: &[&str] = &["docker", "containerd", "kubelet"];

// Location of OS identification on every supported distribution
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Bundle path of the encryption providers configuration with the given name
pub fn encryption_providers_config_path(name: &str) -> String {
    format!("cfg/{name}")
}
