//! Proxy environment for the host and its container/kubelet services

use kubeprep_config::Cluster;
use kubeprep_core::{render, Result, TemplateVariables, PROXY_DROP_IN_NAME, PROXY_ENV_FILE};

const ENVIRONMENT_FILE: &str = r#"set -xeuo pipefail

sudo mkdir -p "$(dirname {{ .ENV_FILE }})"
cat <<'EOF' | sudo tee {{ .ENV_FILE }} >/dev/null
{{ .ENVIRONMENT }}
EOF
sudo chmod 0644 {{ .ENV_FILE }}

if [[ -n "{{ .CA_BUNDLE_PATH }}" ]]; then
    cat <<'EOF' | sudo tee {{ .CA_BUNDLE_PATH }} >/dev/null
{{ .CA_BUNDLE }}
EOF
fi
"#;

const DAEMONS_DROP_IN: &str = r#"set -xeuo pipefail

for svc in {{ .SERVICES }}; do
    sudo mkdir -p "/etc/systemd/system/${svc}.service.d"
    cat <<'EOF' | sudo tee "/etc/systemd/system/${svc}.service.d/{{ .DROP_IN_NAME }}" >/dev/null
[Service]
EnvironmentFile={{ .ENV_FILE }}
EOF
done

sudo systemctl daemon-reload
"#;

const CA_BUNDLE_PATH: &str = "/etc/kubeprep/ca-certificates.crt";

/// `KEY="value"` lines for every proxy variable that is set, upper and lower case
pub fn proxy_environment(cluster: &Cluster) -> Vec<String> {
    let proxy = &cluster.proxy;
    let mut lines = Vec::new();
    for (name, value) in [
        ("HTTP_PROXY", &proxy.http),
        ("HTTPS_PROXY", &proxy.https),
        ("NO_PROXY", &proxy.no_proxy),
    ] {
        if value.is_empty() {
            continue;
        }
        lines.push(format!("{name}=\"{value}\""));
        lines.push(format!("{}=\"{value}\"", name.to_ascii_lowercase()));
    }
    if cluster.has_ca_bundle() {
        lines.push(format!("SSL_CERT_FILE=\"{CA_BUNDLE_PATH}\""));
    }
    lines
}

/// Write the proxy environment file (and the CA bundle when one is configured)
pub fn environment_file(cluster: &Cluster) -> Result<String> {
    let has_bundle = cluster.has_ca_bundle();
    let vars = TemplateVariables::new()
        .with("ENV_FILE", PROXY_ENV_FILE)
        .with("ENVIRONMENT", proxy_environment(cluster).join("\n"))
        .with("CA_BUNDLE_PATH", if has_bundle { CA_BUNDLE_PATH } else { "" })
        .with("CA_BUNDLE", cluster.ca_bundle.trim());
    render("environment-file", ENVIRONMENT_FILE, &vars)
}

/// Point each systemd service at the environment file through a drop-in
pub fn daemons_environment_drop_in(services: &[&str]) -> Result<String> {
    let vars = TemplateVariables::new()
        .with("SERVICES", services.join(" "))
        .with("DROP_IN_NAME", PROXY_DROP_IN_NAME)
        .with("ENV_FILE", PROXY_ENV_FILE);
    render("daemons-environment-drop-in", DAEMONS_DROP_IN, &vars)
}
