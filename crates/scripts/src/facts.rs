//! Read-only probes used to learn a host's state

use kubeprep_core::{ENCRYPTION_PROVIDERS_DIR, KUBELET_KUBECONFIG, OS_RELEASE_PATH};

pub fn os_release() -> String {
    format!("cat {OS_RELEASE_PATH}")
}

/// Prints `yes` when the host already joined a cluster, `no` otherwise
pub fn kubelet_initialized() -> String {
    format!("if [[ -f {KUBELET_KUBECONFIG} ]]; then echo yes; else echo no; fi")
}

pub fn parse_initialized(stdout: &str) -> bool {
    stdout.trim() == "yes"
}

/// Prints the name of the live encryption providers configuration, if any
pub fn encryption_providers_config_name() -> String {
    format!(
        "sudo find {ENCRYPTION_PROVIDERS_DIR} -maxdepth 1 -type f -name '*.yaml' -printf '%f\\n' 2>/dev/null | sort | head -n 1 || true"
    )
}

pub fn parse_config_name(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
