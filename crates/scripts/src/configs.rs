//! Move uploaded bundle files from the working directory into place
//!
//! Each script is a no-op when its source file is absent, so re-running it
//! after a successful move changes nothing.

use kubeprep_core::{
    encryption_providers_config_path, render, Result, TemplateVariables, ADMISSION_CONFIG_DIR,
    ADMISSION_CONFIG_PATH, AUDIT_POLICY_DIR, AUDIT_POLICY_PATH, CLOUD_CONFIG_PATH,
    CLOUD_CONFIG_TARGET, ENCRYPTION_PROVIDERS_DIR, KUBERNETES_CONFIG_DIR,
    POD_NODE_SELECTOR_CONFIG_PATH,
};

const MOVE_FILE: &str = r#"set -xeuo pipefail

if [[ -f "{{ .WORK_DIR }}/{{ .SOURCE }}" ]]; then
    sudo mkdir -p {{ .TARGET_DIR }}
    sudo mv "{{ .WORK_DIR }}/{{ .SOURCE }}" {{ .TARGET }}
    sudo chown root:root {{ .TARGET }}
    sudo chmod 600 {{ .TARGET }}
fi
"#;

fn move_file(name: &str, work_dir: &str, source: &str, target_dir: &str, target: &str) -> Result<String> {
    let vars = TemplateVariables::new()
        .with("WORK_DIR", work_dir)
        .with("SOURCE", source)
        .with("TARGET_DIR", target_dir)
        .with("TARGET", target);
    render(name, MOVE_FILE, &vars)
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub fn save_cloud_config(work_dir: &str) -> Result<String> {
    move_file(
        "save-cloud-config",
        work_dir,
        CLOUD_CONFIG_PATH,
        KUBERNETES_CONFIG_DIR,
        CLOUD_CONFIG_TARGET,
    )
}

pub fn save_audit_policy_config(work_dir: &str) -> Result<String> {
    move_file(
        "save-audit-policy-config",
        work_dir,
        AUDIT_POLICY_PATH,
        AUDIT_POLICY_DIR,
        &format!("{AUDIT_POLICY_DIR}/policy.yaml"),
    )
}

/// Installs both the admission configuration and the PodNodeSelector
/// configuration it references
pub fn save_pod_node_selector_config(work_dir: &str) -> Result<String> {
    let admission = move_file(
        "save-admission-config",
        work_dir,
        ADMISSION_CONFIG_PATH,
        ADMISSION_CONFIG_DIR,
        &format!("{ADMISSION_CONFIG_DIR}/{}", file_name(ADMISSION_CONFIG_PATH)),
    )?;
    let selector = move_file(
        "save-pod-node-selector-config",
        work_dir,
        POD_NODE_SELECTOR_CONFIG_PATH,
        ADMISSION_CONFIG_DIR,
        &format!("{ADMISSION_CONFIG_DIR}/{}", file_name(POD_NODE_SELECTOR_CONFIG_PATH)),
    )?;
    Ok(format!("{admission}\n{selector}"))
}

pub fn save_encryption_providers_config(work_dir: &str, name: &str) -> Result<String> {
    move_file(
        "save-encryption-providers-config",
        work_dir,
        &encryption_providers_config_path(name),
        ENCRYPTION_PROVIDERS_DIR,
        &format!("{ENCRYPTION_PROVIDERS_DIR}/{name}"),
    )
}
