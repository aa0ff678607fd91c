use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};

const KEY_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionConfiguration {
    pub api_version: String,
    pub kind: String,
    pub resources: Vec<ResourceConfiguration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfiguration {
    pub resources: Vec<String>,
    pub providers: Vec<ProviderConfiguration>,
}

/// Exactly one field is set per provider entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aescbc: Option<KeysConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Empty>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysConfiguration {
    pub keys: Vec<Key>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub name: String,
    pub secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// Fresh configuration encrypting Secrets with a random AES-CBC key.
///
/// `identity` stays last so Secrets written before encryption was turned
/// on remain readable.
pub fn new_encryption_providers_config() -> EncryptionConfiguration {
    let mut key = [0u8; KEY_LENGTH];
    rand::thread_rng().fill_bytes(&mut key);

    EncryptionConfiguration {
        api_version: "apiserver.config.k8s.io/v1".to_string(),
        kind: "EncryptionConfiguration".to_string(),
        resources: vec![ResourceConfiguration {
            resources: vec!["secrets".to_string()],
            providers: vec![
                ProviderConfiguration {
                    aescbc: Some(KeysConfiguration {
                        keys: vec![Key {
                            name: format!("kubeprep-{}", chrono::Utc::now().timestamp()),
                            secret: STANDARD.encode(key),
                        }],
                    }),
                    ..ProviderConfiguration::default()
                },
                ProviderConfiguration {
                    identity: Some(Empty {}),
                    ..ProviderConfiguration::default()
                },
            ],
        }],
    }
}
