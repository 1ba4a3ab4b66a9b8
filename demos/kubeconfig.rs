// SPDX-License-Identifier: MIT OR Apache-2.0

//! Example demonstrating a kubeconfig scoped to one unit of work
//!
//! This example shows how to:
//! - Register credentials in a store
//! - Write a kubeconfig for a token credential
//! - Run work with `KUBECONFIG` exported and clean up afterwards
//!
//! Set `KUBECTL_SETUP_BACKEND=kubectl` to edit the file with a real
//! `kubectl` binary instead of in memory.

use kubectl_setup::auth::{AuthResolver, Credential, Secret};
use kubectl_setup::config::{KubeConfig, KubectlParameters, ENV_KUBECONFIG};
use kubectl_setup::testkit::MemoryCredentialStore;
use kubectl_setup::{EditorBackend, KubectlBuildWrapper, Workspace};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Scoped kubeconfig Example ===\n");

    let store = MemoryCredentialStore::new().with(
        Credential::new(
            "deploy-token",
            Secret::StringSecret {
                secret: "t0k3n".to_string(),
            },
        )
        .with_description("token of the deploy service account"),
    );
    let resolver = AuthResolver::new(store);
    println!("Selectable credentials: {:?}", resolver.supported_ids());

    let backend = match std::env::var("KUBECTL_SETUP_BACKEND").as_deref() {
        Ok("kubectl") => EditorBackend::kubectl(),
        _ => EditorBackend::InMemory,
    };

    let wrapper = KubectlBuildWrapper::new(
        KubectlParameters::builder("deploy-token")
            .server_url("https://${API_HOST}:6443")
            .namespace("demo")
            .build(),
    )
    .with_backend(backend);

    let dir = tempfile::tempdir()?;
    let workspace = Workspace::new(dir.path().join("job")).with_var("API_HOST", "10.0.0.1");

    let written = wrapper.with_kubeconfig(&workspace, &resolver, |context| {
        let path = context.kubeconfig()?.to_path_buf();
        println!("✓ {}={}", ENV_KUBECONFIG, path.display());

        let config = KubeConfig::load_from_path(&path).ok()?;
        println!("  Current context: {:?}", config.current_context());
        if let Some(ctx) = config.active_context() {
            println!("  Cluster: {}", ctx.cluster);
            println!("  User: {}", ctx.user);
            println!("  Namespace: {:?}", ctx.namespace);
        }
        Some(path)
    })?;

    if let Some(path) = written {
        println!("\n✓ Removed after the work unit: {}", !path.exists());
    }
    Ok(())
}
