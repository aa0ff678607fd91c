//! kubeadm, kubelet and container runtime installation, one script per
//! distribution family

use kubeprep_config::{Cluster, ContainerRuntime};
use kubeprep_core::{render, Result, TemplateVariables};

const PREAMBLE: &str = r#"set -xeuo pipefail
export "PATH=$PATH:/sbin:/usr/local/bin:/opt/bin"

if [[ "{{ .FORCE }}" != "true" ]] && command -v kubeadm >/dev/null 2>&1 \
    && [[ "$(kubeadm version -o short 2>/dev/null)" == "v{{ .KUBERNETES_VERSION }}" ]]; then
    echo "kubeadm v{{ .KUBERNETES_VERSION }} is already installed"
    exit 0
fi
"#;

const KERNEL_SETUP: &str = r#"
sudo swapoff -a
sudo sed -i '/.*swap.*/d' /etc/fstab

sudo modprobe overlay
sudo modprobe br_netfilter
cat <<EOF | sudo tee /etc/modules-load.d/kubeprep.conf
overlay
br_netfilter
EOF

cat <<EOF | sudo tee /etc/sysctl.d/k8s.conf
net.bridge.bridge-nf-call-ip6tables = 1
net.bridge.bridge-nf-call-iptables = 1
net.ipv4.ip_forward = 1
EOF
sudo sysctl --system
"#;

const CONTAINERD_CONFIG: &str = r#"
if [[ "{{ .CONTAINER_RUNTIME }}" == "containerd" ]]; then
    sudo mkdir -p /etc/containerd
    containerd config default | sed 's/SystemdCgroup = false/SystemdCgroup = true/' | sudo tee /etc/containerd/config.toml >/dev/null
fi
"#;

const ENABLE_SERVICES: &str = r#"
sudo systemctl daemon-reload
sudo systemctl enable --now {{ .CONTAINER_RUNTIME }}
sudo systemctl enable --now kubelet
"#;

const DEBIAN: &str = r#"
if [[ -n "{{ .HTTPS_PROXY }}" ]]; then
    echo 'Acquire::https::Proxy "{{ .HTTPS_PROXY }}";' | sudo tee /etc/apt/apt.conf.d/proxy.conf
fi
if [[ -n "{{ .HTTP_PROXY }}" ]]; then
    echo 'Acquire::http::Proxy "{{ .HTTP_PROXY }}";' | sudo tee -a /etc/apt/apt.conf.d/proxy.conf
fi

sudo apt-get update
sudo DEBIAN_FRONTEND=noninteractive apt-get install -y --no-install-recommends \
    apt-transport-https ca-certificates curl gnupg rsync

sudo install -m 0755 -d /etc/apt/keyrings
curl -fsSL https://pkgs.k8s.io/core:/stable:/v{{ .KUBERNETES_STREAM }}/deb/Release.key \
    | sudo gpg --dearmor --yes -o /etc/apt/keyrings/kubernetes.gpg
echo "deb [signed-by=/etc/apt/keyrings/kubernetes.gpg] https://pkgs.k8s.io/core:/stable:/v{{ .KUBERNETES_STREAM }}/deb/ /" \
    | sudo tee /etc/apt/sources.list.d/kubernetes.list
sudo apt-get update

kube_ver="$(apt-cache madison kubeadm | grep -F " {{ .KUBERNETES_VERSION }}-" | head -1 | awk '{print $3}')"
sudo apt-mark unhold kubelet kubeadm kubectl || true
sudo DEBIAN_FRONTEND=noninteractive apt-get install -y --allow-downgrades \
    {{ .RUNTIME_PACKAGE }} \
    kubelet="${kube_ver}" kubeadm="${kube_ver}" kubectl="${kube_ver}"
sudo apt-mark hold kubelet kubeadm kubectl
"#;

const CENTOS: &str = r#"
sudo setenforce 0 || true
sudo sed -i 's/^SELINUX=enforcing$/SELINUX=permissive/' /etc/selinux/config

if [[ -n "{{ .HTTPS_PROXY }}" ]]; then
    grep -q '^proxy=' /etc/yum.conf || echo "proxy={{ .HTTPS_PROXY }}" | sudo tee -a /etc/yum.conf
fi

sudo yum install -y yum-utils ca-certificates curl rsync
sudo yum-config-manager --add-repo https://download.docker.com/linux/centos/docker-ce.repo

cat <<EOF | sudo tee /etc/yum.repos.d/kubernetes.repo
[kubernetes]
name=Kubernetes
baseurl=https://pkgs.k8s.io/core:/stable:/v{{ .KUBERNETES_STREAM }}/rpm/
enabled=1
gpgcheck=1
gpgkey=https://pkgs.k8s.io/core:/stable:/v{{ .KUBERNETES_STREAM }}/rpm/repodata/repomd.xml.key
exclude=kubelet kubeadm kubectl
EOF

sudo yum install -y --disableexcludes=kubernetes \
    {{ .RUNTIME_PACKAGE }} \
    kubelet-{{ .KUBERNETES_VERSION }} kubeadm-{{ .KUBERNETES_VERSION }} kubectl-{{ .KUBERNETES_VERSION }}
"#;

const AMAZON_LINUX: &str = r#"
if [[ -n "{{ .HTTPS_PROXY }}" ]]; then
    grep -q '^proxy=' /etc/yum.conf || echo "proxy={{ .HTTPS_PROXY }}" | sudo tee -a /etc/yum.conf
fi

sudo yum install -y ca-certificates curl rsync

cat <<EOF | sudo tee /etc/yum.repos.d/kubernetes.repo
[kubernetes]
name=Kubernetes
baseurl=https://pkgs.k8s.io/core:/stable:/v{{ .KUBERNETES_STREAM }}/rpm/
enabled=1
gpgcheck=1
gpgkey=https://pkgs.k8s.io/core:/stable:/v{{ .KUBERNETES_STREAM }}/rpm/repodata/repomd.xml.key
exclude=kubelet kubeadm kubectl
EOF

sudo yum install -y --disableexcludes=kubernetes \
    {{ .RUNTIME_PACKAGE }} \
    kubelet-{{ .KUBERNETES_VERSION }} kubeadm-{{ .KUBERNETES_VERSION }} kubectl-{{ .KUBERNETES_VERSION }}
"#;

const FLATCAR: &str = r#"
sudo mkdir -p /opt/bin /opt/cni/bin /etc/systemd/system/kubelet.service.d
cd /opt/bin

for bin in kubeadm kubelet kubectl; do
    sudo curl -fsSL --retry 5 -o "${bin}.tmp" "https://dl.k8s.io/release/v{{ .KUBERNETES_VERSION }}/bin/linux/amd64/${bin}"
    sudo chmod +x "${bin}.tmp"
    sudo mv "${bin}.tmp" "${bin}"
done

curl -fsSL "https://raw.githubusercontent.com/kubernetes/release/v0.16.2/cmd/krel/templates/latest/kubelet/kubelet.service" \
    | sed "s:/usr/bin:/opt/bin:g" | sudo tee /etc/systemd/system/kubelet.service
curl -fsSL "https://raw.githubusercontent.com/kubernetes/release/v0.16.2/cmd/krel/templates/latest/kubeadm/10-kubeadm.conf" \
    | sed "s:/usr/bin:/opt/bin:g" | sudo tee /etc/systemd/system/kubelet.service.d/10-kubeadm.conf
"#;

/// Distribution package providing the container runtime
fn runtime_package(runtime: ContainerRuntime, family: Family) -> &'static str {
    match (runtime, family) {
        (ContainerRuntime::Containerd, Family::Debian) => "containerd",
        (ContainerRuntime::Docker, Family::Debian) => "docker.io",
        (ContainerRuntime::Containerd, Family::CentOS) => "containerd.io",
        (ContainerRuntime::Docker, Family::CentOS) => "docker-ce containerd.io",
        (ContainerRuntime::Containerd, Family::AmazonLinux) => "containerd",
        (ContainerRuntime::Docker, Family::AmazonLinux) => "docker containerd",
    }
}

#[derive(Clone, Copy)]
enum Family {
    Debian,
    CentOS,
    AmazonLinux,
}

/// Variables shared by every install script
pub fn kubeadm_variables(cluster: &Cluster, force: bool) -> Result<TemplateVariables> {
    let mut vars = TemplateVariables::new()
        .with("KUBERNETES_VERSION", cluster.versions.kubernetes_version())
        .with("KUBERNETES_STREAM", cluster.versions.kubernetes_stream()?)
        .with("CONTAINER_RUNTIME", cluster.container_runtime.to_string())
        .with("HTTP_PROXY", cluster.proxy.http.as_str())
        .with("HTTPS_PROXY", cluster.proxy.https.as_str())
        .with("NO_PROXY", cluster.proxy.no_proxy.as_str());
    vars.insert_bool("FORCE", force);
    Ok(vars)
}

fn package_install(name: &str, body: &str, family: Family, cluster: &Cluster, force: bool) -> Result<String> {
    let template = [PREAMBLE, KERNEL_SETUP, body, CONTAINERD_CONFIG, ENABLE_SERVICES].concat();
    let mut vars = kubeadm_variables(cluster, force)?;
    vars.insert("RUNTIME_PACKAGE", runtime_package(cluster.container_runtime, family));
    render(name, &template, &vars)
}

/// Debian and Ubuntu (apt)
pub fn kubeadm_debian(cluster: &Cluster, force: bool) -> Result<String> {
    package_install("kubeadm-debian", DEBIAN, Family::Debian, cluster, force)
}

/// CentOS and RHEL (yum)
pub fn kubeadm_centos(cluster: &Cluster, force: bool) -> Result<String> {
    package_install("kubeadm-centos", CENTOS, Family::CentOS, cluster, force)
}

/// Amazon Linux 2 (yum, runtime from the Amazon repositories)
pub fn kubeadm_amazon_linux(cluster: &Cluster, force: bool) -> Result<String> {
    package_install("kubeadm-amazon-linux", AMAZON_LINUX, Family::AmazonLinux, cluster, force)
}

/// Flatcar ships its runtimes; only the Kubernetes binaries are installed
pub fn kubeadm_flatcar(cluster: &Cluster, force: bool) -> Result<String> {
    let template = [PREAMBLE, KERNEL_SETUP, FLATCAR, CONTAINERD_CONFIG, ENABLE_SERVICES].concat();
    render("kubeadm-flatcar", &template, &kubeadm_variables(cluster, force)?)
}
