// SPDX-License-Identifier: MIT OR Apache-2.0

use kubectl_setup::auth::{AuthResolver, Credential, Secret};
use kubectl_setup::config::{
    KubeConfig, KubectlParameters, DEFAULT_CLUSTER_NAME, DEFAULT_CONTEXT_NAME, DEFAULT_USER_NAME,
    ENV_KUBECONFIG,
};
use kubectl_setup::testkit::{self, MemoryCredentialStore, TestWorkspace, SERVICE_ACCOUNT_KUBECONFIG};
use kubectl_setup::{KubeConfigAssembler, KubectlBuildWrapper, KubectlError, Workspace};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn resolver() -> AuthResolver<MemoryCredentialStore> {
    let store = MemoryCredentialStore::new()
        .with(Credential::new(
            "deploy-token",
            Secret::StringSecret {
                secret: "t0k3n".to_string(),
            },
        ))
        .with(
            Credential::new(
                "service-account",
                Secret::KubeconfigFile {
                    content: SERVICE_ACCOUNT_KUBECONFIG.to_string(),
                },
            )
            .with_description("kubeconfig of the ci service account"),
        )
        .with(Credential::new(
            "client-cert",
            Secret::Certificate {
                certificate: testkit::client_certificate_pem(),
                key: testkit::client_key_pem(),
            },
        ))
        .with(Credential::new(
            "ssh",
            Secret::Other {
                kind: "ssh-private-key".to_string(),
                fields: Default::default(),
            },
        ));
    AuthResolver::new(store)
}

#[test]
fn test_set_up_and_tear_down() -> anyhow::Result<()> {
    init_tracing();
    let ws = TestWorkspace::create();
    let wrapper = KubectlBuildWrapper::new(
        KubectlParameters::builder("deploy-token")
            .server_url("https://10.0.0.1:6443")
            .build(),
    );

    let context = wrapper.set_up(&ws.workspace(), &resolver())?;
    let path = context.kubeconfig().expect("KUBECONFIG is set").to_path_buf();

    assert!(path.exists());
    assert!(path.starts_with(ws.path()));
    let expected = path.to_string_lossy().into_owned();
    assert_eq!(context.env().get(ENV_KUBECONFIG), Some(&expected));

    let config = KubeConfig::load_from_path(&path)?;
    assert_eq!(config.current_context(), Some(DEFAULT_CONTEXT_NAME));
    assert_eq!(
        config.user(DEFAULT_USER_NAME).and_then(|u| u.token.as_deref()),
        Some("t0k3n")
    );

    context.tear_down();
    assert!(!path.exists());
    assert!(ws.files().is_empty());
    Ok(())
}

#[test]
fn test_no_credential_configured_writes_nothing() {
    let ws = TestWorkspace::create();
    let workspace = Workspace::new(ws.missing_subdirectory("job"));

    for params in [
        KubectlParameters::default(),
        KubectlParameters::builder("").server_url("https://x").build(),
    ] {
        let result = KubectlBuildWrapper::new(params).set_up(&workspace, &resolver());
        assert!(matches!(result, Err(KubectlError::NoCredentialConfigured)));
    }

    // not even the workspace directory is created
    assert!(!workspace.root().exists());
}

#[test]
fn test_resolution_errors_write_nothing() {
    let ws = TestWorkspace::create();

    let missing = KubectlBuildWrapper::new(KubectlParameters::builder("nope").build())
        .set_up(&ws.workspace(), &resolver());
    assert!(matches!(missing, Err(KubectlError::CredentialNotFound(ref id)) if id == "nope"));

    let unsupported = KubectlBuildWrapper::new(KubectlParameters::builder("ssh").build())
        .set_up(&ws.workspace(), &resolver());
    assert!(matches!(
        unsupported,
        Err(KubectlError::UnsupportedCredentialType(ref kind)) if kind == "ssh-private-key"
    ));

    assert!(ws.files().is_empty());
}

#[test]
fn test_failed_assembly_leaves_no_file() {
    let ws = TestWorkspace::create();
    let wrapper = KubectlBuildWrapper::new(
        KubectlParameters::builder("deploy-token")
            .ca_certificate("definitely not a certificate!")
            .build(),
    );

    let result = wrapper.set_up(&ws.workspace(), &resolver());
    assert!(matches!(result, Err(KubectlError::InvalidCertificate(_))));
    assert!(ws.files().is_empty());
}

#[test]
fn test_missing_workspace_is_created() -> anyhow::Result<()> {
    let ws = TestWorkspace::create();
    let workspace = Workspace::new(ws.missing_subdirectory("fresh"));
    let assembler = KubeConfigAssembler::new(KubectlParameters::builder("deploy-token").build());

    let path = assembler.write_kube_config(&resolver(), &workspace)?;

    assert!(path.starts_with(workspace.root()));
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with(".kube"));
    assert!(name.ends_with("config"));
    Ok(())
}

#[test]
fn test_each_run_gets_its_own_file() -> anyhow::Result<()> {
    let ws = TestWorkspace::create();
    let assembler = KubeConfigAssembler::new(KubectlParameters::builder("deploy-token").build());

    let first = assembler.write_kube_config(&resolver(), &ws.workspace())?;
    let second = assembler.write_kube_config(&resolver(), &ws.workspace())?;

    assert_ne!(first, second);
    assert_eq!(
        KubeConfig::load_from_path(&first)?,
        KubeConfig::load_from_path(&second)?
    );
    Ok(())
}

#[test]
fn test_service_account_kubeconfig_with_server_override() -> anyhow::Result<()> {
    let ws = TestWorkspace::create();
    let workspace = ws.workspace().with_var("API", "https://x");
    let assembler = KubeConfigAssembler::new(
        KubectlParameters::builder("service-account")
            .server_url("$API")
            .build(),
    );

    let config = KubeConfig::load_from_path(assembler.write_kube_config(&resolver(), &workspace)?)?;

    assert_eq!(config.current_context(), Some("ctx1"));
    assert_eq!(config.cluster(DEFAULT_CLUSTER_NAME).unwrap().server, "https://x");
    assert!(config.cluster(DEFAULT_CLUSTER_NAME).unwrap().is_insecure());
    assert_eq!(config.context("ctx1").unwrap().cluster, DEFAULT_CLUSTER_NAME);
    assert_eq!(config.user("sa").unwrap().token.as_deref(), Some("service-account-token"));
    assert!(config.validate().is_empty());
    Ok(())
}

#[test]
fn test_client_certificate_credential() -> anyhow::Result<()> {
    let ws = TestWorkspace::create();
    let assembler = KubeConfigAssembler::new(
        KubectlParameters::builder("client-cert")
            .server_url("https://api.example.com")
            .ca_certificate(testkit::ca_certificate_body())
            .namespace("team-a")
            .build(),
    );

    let config = KubeConfig::load_from_path(assembler.write_kube_config(&resolver(), &ws.workspace())?)?;

    let user = config.user(DEFAULT_USER_NAME).unwrap();
    assert!(user.client_certificate_data.is_some());
    assert!(user.client_key_data.is_some());
    assert!(user.token.is_none());

    let cluster = config.cluster(DEFAULT_CLUSTER_NAME).unwrap();
    assert!(cluster.certificate_authority_data.is_some());
    assert!(!cluster.is_insecure());
    assert_eq!(
        config.context(DEFAULT_CONTEXT_NAME).unwrap().namespace.as_deref(),
        Some("team-a")
    );
    Ok(())
}

#[test]
fn test_with_kubeconfig_tears_down_on_failure() -> anyhow::Result<()> {
    let ws = TestWorkspace::create();
    let wrapper = KubectlBuildWrapper::new(KubectlParameters::builder("deploy-token").build());

    let mut seen = None;
    let outcome: Result<(), String> = wrapper.with_kubeconfig(&ws.workspace(), &resolver(), |context| {
        let path = context.kubeconfig().unwrap().to_path_buf();
        assert!(path.exists());
        seen = Some(path);
        Err("kubectl apply failed".to_string())
    })?;

    assert!(outcome.is_err());
    assert!(!seen.unwrap().exists());
    assert!(ws.files().is_empty());
    Ok(())
}

#[test]
fn test_dropped_context_still_cleans_up() -> anyhow::Result<()> {
    let ws = TestWorkspace::create();
    let wrapper = KubectlBuildWrapper::new(KubectlParameters::builder("deploy-token").build());

    let context = wrapper.set_up(&ws.workspace(), &resolver())?;
    let path = context.kubeconfig().unwrap().to_path_buf();
    drop(context);

    assert!(!path.exists());
    Ok(())
}

#[cfg(unix)]
mod kubectl_backend {
    use super::*;
    use kubectl_setup::EditorBackend;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    fn fake_kubectl(dir: &Path, exit_code: i32) -> PathBuf {
        scripted_kubectl(dir, "", exit_code)
    }

    fn scripted_kubectl(dir: &Path, action: &str, exit_code: i32) -> PathBuf {
        let path = dir.join("kubectl");
        let script = format!(
            "#!/bin/sh\n\
             echo \"$*\" >> \"{log}\"\n\
             [ -f \"$KUBECONFIG\" ] || exit 9\n\
             if [ \"$2\" = \"current-context\" ]; then echo ctx1; fi\n\
             {action}\n\
             exit {exit_code}\n",
            log = dir.join("calls.log").display(),
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn calls(dir: &Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    // Both scenarios share one test so no other test forks while a script is
    // open for writing.
    #[test]
    fn test_kubectl_backend() -> anyhow::Result<()> {
        init_tracing();

        // patches a full document in order, with the CA handed over as a file
        let bin = tempfile::tempdir()?;
        let ws = TestWorkspace::create();
        let backend = EditorBackend::Kubectl {
            binary: fake_kubectl(bin.path(), 0),
        };
        let assembler = KubeConfigAssembler::new(
            KubectlParameters::builder("service-account")
                .server_url("https://x")
                .ca_certificate(testkit::ca_certificate_body())
                .namespace("ns")
                .build(),
        )
        .with_backend(backend);

        let path = assembler.write_kube_config(&resolver(), &ws.workspace())?;
        let recorded = calls(bin.path());

        assert_eq!(recorded.len(), 5);
        assert!(recorded[0].starts_with("config set-cluster k8s --server=https://x --embed-certs=true --certificate-authority="));
        assert_eq!(recorded[1], "config current-context");
        assert_eq!(recorded[2], "config set-context ctx1 --cluster=k8s");
        assert_eq!(recorded[3], "config current-context");
        assert_eq!(recorded[4], "config set-context ctx1 --namespace=ns");

        // only the kubeconfig is left, the CA file is gone
        assert_eq!(ws.files().len(), 1);
        assert_eq!(std::fs::read_to_string(&path)?, SERVICE_ACCOUNT_KUBECONFIG);

        // a failing kubectl aborts and leaves nothing behind
        let bin = tempfile::tempdir()?;
        let ws = TestWorkspace::create();
        let assembler = KubeConfigAssembler::new(KubectlParameters::builder("deploy-token").build())
            .with_backend(EditorBackend::Kubectl {
                binary: fake_kubectl(bin.path(), 3),
            });

        match assembler.write_kube_config(&resolver(), &ws.workspace()) {
            Err(KubectlError::DocumentWrite { operation, reason }) => {
                assert_eq!(operation, "add kubectl cluster");
                assert!(reason.starts_with("exit code 3"));
            }
            other => panic!("Expected DocumentWrite, got {:?}", other),
        }
        assert_eq!(calls(bin.path()).len(), 1);
        assert!(ws.files().is_empty());

        // a file kubectl left unreadable is still handed over
        let bin = tempfile::tempdir()?;
        let ws = TestWorkspace::create();
        let assembler = KubeConfigAssembler::new(KubectlParameters::builder("deploy-token").build())
            .with_backend(EditorBackend::Kubectl {
                binary: scripted_kubectl(bin.path(), "echo 'clusters: [' > \"$KUBECONFIG\"", 0),
            });

        let path = assembler.write_kube_config(&resolver(), &ws.workspace())?;
        assert_eq!(calls(bin.path()).len(), 4);
        assert!(KubeConfig::load_from_path(&path).is_err());
        Ok(())
    }
}
