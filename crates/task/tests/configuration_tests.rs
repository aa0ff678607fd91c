use kubeprep_config::{
    EncryptionProviders, PodNodeSelector, PodNodeSelectorConfig, StaticAuditLog,
    StaticAuditLogConfig,
};
use kubeprep_core::OperatingSystem;
use kubeprep_ssh::testing::{FakeConnector, FakeReply};
use kubeprep_task::{generate_configuration_files, FileSource, Pipeline, PipelineState};
use std::path::PathBuf;
use tempfile::TempDir;

mod common;
use common::{cluster, context, context_in, control_plane, script_index, worker};

const CUSTOM_ENCRYPTION: &str = "apiVersion: apiserver.config.k8s.io/v1\nkind: EncryptionConfiguration\n";

fn two_hosts() -> kubeprep_config::Cluster {
    cluster(
        vec![control_plane(1, OperatingSystem::Ubuntu)],
        vec![worker(2, OperatingSystem::Ubuntu)],
    )
}

fn content(source: Option<&FileSource>) -> &str {
    match source {
        Some(FileSource::Content(content)) => content,
        other => panic!("expected inline content, got {other:?}"),
    }
}

#[test]
fn cloud_config_is_always_present() {
    let mut cluster = two_hosts();
    cluster.cloud_provider.cloud_config = String::new();
    let ctx = context(cluster, &FakeConnector::new());

    let configuration = generate_configuration_files(&ctx).unwrap();

    assert_eq!(configuration.paths().collect::<Vec<_>>(), vec!["cfg/cloud-config"]);
    assert_eq!(content(configuration.get("cfg/cloud-config")), "");
}

#[test]
fn audit_policy_and_pod_node_selector_resolve_against_manifest_dir() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("audit.yaml"), "rules: []\n").unwrap();
    std::fs::write(dir.path().join("pns.yaml"), "podNodeSelectorPluginConfig: {}\n").unwrap();

    let mut cluster = two_hosts();
    cluster.features.static_audit_log = Some(StaticAuditLog {
        enable: true,
        config: StaticAuditLogConfig {
            policy_file_path: PathBuf::from("audit.yaml"),
        },
    });
    cluster.features.pod_node_selector = Some(PodNodeSelector {
        enable: true,
        config: PodNodeSelectorConfig {
            config_file_path: PathBuf::from("pns.yaml"),
        },
    });
    let ctx = context_in(cluster, &FakeConnector::new(), dir.path());

    let configuration = generate_configuration_files(&ctx).unwrap();

    assert_eq!(
        configuration.paths().collect::<Vec<_>>(),
        vec![
            "cfg/cloud-config",
            "cfg/audit-policy.yaml",
            "cfg/admission-config.yaml",
            "cfg/podnodeselector.yaml",
        ]
    );
    assert_eq!(
        configuration.get("cfg/audit-policy.yaml"),
        Some(&FileSource::Path(dir.path().join("audit.yaml")))
    );
    assert!(content(configuration.get("cfg/admission-config.yaml")).contains("PodNodeSelector"));
}

#[test]
fn disabled_features_add_nothing() {
    let mut cluster = two_hosts();
    cluster.features.static_audit_log = Some(StaticAuditLog {
        enable: false,
        config: StaticAuditLogConfig {
            policy_file_path: PathBuf::from("/does/not/exist.yaml"),
        },
    });
    cluster.features.encryption_providers = Some(EncryptionProviders {
        enable: false,
        custom_encryption_configuration: CUSTOM_ENCRYPTION.to_string(),
    });
    let ctx = context(cluster, &FakeConnector::new());

    let configuration = generate_configuration_files(&ctx).unwrap();
    assert_eq!(configuration.len(), 1);
}

#[tokio::test]
async fn missing_audit_policy_fails_generation_and_publishes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut cluster = two_hosts();
    cluster.features.static_audit_log = Some(StaticAuditLog {
        enable: true,
        config: StaticAuditLogConfig {
            policy_file_path: PathBuf::from("missing.yaml"),
        },
    });
    let ctx = context_in(cluster, &FakeConnector::new(), dir.path());

    let err = Pipeline::new(ctx.clone())
        .run_states(&[PipelineState::GenerateConfig])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("unable to add audit policy file"));
    assert!(ctx.configuration().is_err());
}

#[test]
fn encryption_is_generated_when_newly_enabled() {
    let mut cluster = two_hosts();
    cluster.features.encryption_providers = Some(EncryptionProviders {
        enable: true,
        ..EncryptionProviders::default()
    });
    let ctx = context(cluster, &FakeConnector::new());

    let configuration = generate_configuration_files(&ctx).unwrap();

    let generated = content(configuration.get("cfg/encryption-providers.yaml"));
    assert!(generated.contains("kind: EncryptionConfiguration"));
    assert!(generated.contains("aescbc"));
}

#[test]
fn custom_encryption_configuration_is_used_verbatim() {
    let mut cluster = two_hosts();
    cluster.features.encryption_providers = Some(EncryptionProviders {
        enable: true,
        custom_encryption_configuration: CUSTOM_ENCRYPTION.to_string(),
    });
    let ctx = context(cluster, &FakeConnector::new());

    let configuration = generate_configuration_files(&ctx).unwrap();

    assert_eq!(
        content(configuration.get("cfg/encryption-providers.yaml")),
        CUSTOM_ENCRYPTION
    );
}

#[test]
fn live_encryption_keeps_its_name_and_is_not_regenerated() {
    let mut cluster = two_hosts();
    cluster.features.encryption_providers = Some(EncryptionProviders {
        enable: true,
        ..EncryptionProviders::default()
    });
    let ctx = context(cluster, &FakeConnector::new());
    ctx.registry
        .get(1)
        .unwrap()
        .set_encryption_config(Some("live.yaml".to_string()))
        .unwrap();

    let configuration = generate_configuration_files(&ctx).unwrap();

    // Rotating keys on a live cluster is not done implicitly.
    assert!(configuration.get("cfg/live.yaml").is_none());
    assert_eq!(configuration.len(), 1);
}

#[test]
fn live_encryption_with_custom_configuration_replaces_it_in_place() {
    let mut cluster = two_hosts();
    cluster.features.encryption_providers = Some(EncryptionProviders {
        enable: true,
        custom_encryption_configuration: CUSTOM_ENCRYPTION.to_string(),
    });
    let ctx = context(cluster, &FakeConnector::new());
    ctx.registry
        .get(1)
        .unwrap()
        .set_encryption_config(Some("live.yaml".to_string()))
        .unwrap();

    let configuration = generate_configuration_files(&ctx).unwrap();

    assert_eq!(content(configuration.get("cfg/live.yaml")), CUSTOM_ENCRYPTION);
    assert!(configuration.get("cfg/encryption-providers.yaml").is_none());
}

#[tokio::test]
async fn upload_stages_files_then_installs_them_in_order() {
    let fake = FakeConnector::new();
    fake.respond(
        Some(1),
        "encryption-providers -maxdepth",
        FakeReply::Ok("live.yaml\n".to_string()),
    );
    let mut cluster = two_hosts();
    cluster.features.encryption_providers = Some(EncryptionProviders {
        enable: true,
        custom_encryption_configuration: CUSTOM_ENCRYPTION.to_string(),
    });
    let ctx = context(cluster, &fake);

    Pipeline::new(ctx)
        .run_states(&[
            PipelineState::GatherFacts,
            PipelineState::GenerateConfig,
            PipelineState::UploadConfig,
        ])
        .await
        .unwrap();

    for host in 1..=2 {
        let uploads = fake.uploads(host);
        assert_eq!(uploads["kubeprep/cfg/live.yaml"], CUSTOM_ENCRYPTION.as_bytes().to_vec());
        assert!(uploads.contains_key("kubeprep/cfg/cloud-config"));

        let cloud = script_index(&fake, host, "/etc/kubernetes/cloud-config").unwrap();
        let audit = script_index(&fake, host, "/etc/kubernetes/audit/policy.yaml").unwrap();
        let admission = script_index(&fake, host, "/etc/kubernetes/admission/").unwrap();
        let encryption =
            script_index(&fake, host, "/etc/kubernetes/encryption-providers/live.yaml").unwrap();
        assert!(cloud < audit && audit < admission && admission < encryption);
    }
}

#[tokio::test]
async fn upload_before_generation_is_an_error() {
    let ctx = context(two_hosts(), &FakeConnector::new());

    let err = Pipeline::new(ctx)
        .run_states(&[PipelineState::UploadConfig])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("configuration files have not been generated"));
}
