use crate::to_yaml;
use kubeprep_config::{PodNodeSelector, Versions};
use kubeprep_core::{Result, ADMISSION_CONFIG_DIR, POD_NODE_SELECTOR_CONFIG_PATH};
use serde::Serialize;

const POD_NODE_SELECTOR_PLUGIN: &str = "PodNodeSelector";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdmissionConfiguration {
    api_version: String,
    kind: &'static str,
    plugins: Vec<AdmissionPlugin>,
}

#[derive(Debug, Serialize)]
struct AdmissionPlugin {
    name: &'static str,
    path: String,
}

/// API group version of AdmissionConfiguration understood by the API server
pub fn admission_api_version(versions: &Versions) -> Result<&'static str> {
    let (major, minor) = versions.kubernetes_minor()?;
    Ok(if (major, minor) >= (1, 17) {
        "apiserver.config.k8s.io/v1"
    } else {
        "apiserver.config.k8s.io/v1alpha1"
    })
}

/// AdmissionConfiguration pointing the PodNodeSelector plugin at its
/// installed configuration file
pub fn new_admission_config(versions: &Versions, _feature: &PodNodeSelector) -> Result<String> {
    let file = POD_NODE_SELECTOR_CONFIG_PATH
        .rsplit('/')
        .next()
        .unwrap_or(POD_NODE_SELECTOR_CONFIG_PATH);

    to_yaml(&AdmissionConfiguration {
        api_version: admission_api_version(versions)?.to_string(),
        kind: "AdmissionConfiguration",
        plugins: vec![AdmissionPlugin {
            name: POD_NODE_SELECTOR_PLUGIN,
            path: format!("{ADMISSION_CONFIG_DIR}/{file}"),
        }],
    })
}
