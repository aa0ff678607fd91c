use kubeprep_core::{render, Result, TemplateVariables};

// nm-cloud-setup rewrites routes behind the CNI's back; it has to go, and
// NetworkManager only forgets its rules after a reboot.
const DISABLE_NM_CLOUD_SETUP: &str = r#"set -xeuo pipefail

if systemctl is-active --quiet nm-cloud-setup.timer; then
    sudo systemctl stop nm-cloud-setup.timer
    sudo systemctl disable nm-cloud-setup.service
    sudo systemctl disable nm-cloud-setup.timer
    sudo reboot
fi
"#;

/// Marker the reboot step looks for in the script it sent
pub const NM_CLOUD_SETUP_REBOOT_MARKER: &str = "sudo reboot";

pub fn disable_nm_cloud_setup() -> Result<String> {
    render(
        "disable-nm-cloud-setup",
        DISABLE_NM_CLOUD_SETUP,
        &TemplateVariables::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reboot_is_conditional_on_active_timer() {
        let script = disable_nm_cloud_setup().unwrap();
        let guard = script.find("is-active --quiet nm-cloud-setup.timer").unwrap();
        let reboot = script.find(NM_CLOUD_SETUP_REBOOT_MARKER).unwrap();
        assert!(guard < reboot);
    }
}
