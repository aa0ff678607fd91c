//! Kubernetes configuration documents kubeprep generates itself
//!
//! Only the documents placed in the configuration bundle live here: the
//! API server admission configuration for PodNodeSelector and the
//! EncryptionConfiguration used when encryption at rest is turned on.

pub mod admission;
pub mod encryption;

pub use admission::new_admission_config;
pub use encryption::{new_encryption_providers_config, EncryptionConfiguration};

use kubeprep_core::{Error, Result};
use serde::Serialize;

/// Serialize a Kubernetes document to YAML
pub fn to_yaml<T: Serialize>(document: &T) -> Result<String> {
    serde_yaml::to_string(document).map_err(|source| Error::Yaml {
        message: "failed to serialize manifest".to_string(),
        source,
    })
}
