//! Operating system identification

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating systems kubeprep knows how to prepare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingSystem {
    Debian,
    Ubuntu,
    #[serde(rename = "centos")]
    CentOS,
    Rhel,
    #[serde(rename = "amzn")]
    AmazonLinux,
    Flatcar,
    #[default]
    #[serde(other)]
    Unknown,
}

impl OperatingSystem {
    /// Every variant, in declaration order
    pub const ALL: [OperatingSystem; 7] = [
        OperatingSystem::Debian,
        OperatingSystem::Ubuntu,
        OperatingSystem::CentOS,
        OperatingSystem::Rhel,
        OperatingSystem::AmazonLinux,
        OperatingSystem::Flatcar,
        OperatingSystem::Unknown,
    ];

    /// Parse the `ID=` value of `/etc/os-release`.
    ///
    /// Anything unrecognised maps to `Unknown` rather than failing, so an
    /// unsupported host surfaces as an unsupported-OS error at dispatch time.
    pub fn from_os_release_id(id: &str) -> Self {
        match id.trim().trim_matches('"').to_ascii_lowercase().as_str() {
            "debian" => OperatingSystem::Debian,
            "ubuntu" => OperatingSystem::Ubuntu,
            "centos" => OperatingSystem::CentOS,
            "rhel" => OperatingSystem::Rhel,
            "amzn" => OperatingSystem::AmazonLinux,
            "flatcar" => OperatingSystem::Flatcar,
            _ => OperatingSystem::Unknown,
        }
    }

    /// Extract the OS from the full content of `/etc/os-release`
    pub fn from_os_release(content: &str) -> Self {
        content
            .lines()
            .find_map(|line| line.trim().strip_prefix("ID="))
            .map(Self::from_os_release_id)
            .unwrap_or_default()
    }

    /// Debian and Ubuntu
    pub fn is_debian_family(self) -> bool {
        matches!(self, OperatingSystem::Debian | OperatingSystem::Ubuntu)
    }

    /// CentOS and RHEL
    pub fn is_rhel_family(self) -> bool {
        matches!(self, OperatingSystem::CentOS | OperatingSystem::Rhel)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperatingSystem::Debian => "debian",
            OperatingSystem::Ubuntu => "ubuntu",
            OperatingSystem::CentOS => "centos",
            OperatingSystem::Rhel => "rhel",
            OperatingSystem::AmazonLinux => "amzn",
            OperatingSystem::Flatcar => "flatcar",
            OperatingSystem::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatingSystem {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_os_release_id(s))
    }
}
