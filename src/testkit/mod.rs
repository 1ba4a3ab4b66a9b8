// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for exercising the crate without a real credential store or
//! build host.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tempfile::TempDir;

use crate::auth::{Credential, CredentialStore};
use crate::lifecycle::Workspace;

/// Credential store backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    credentials: BTreeMap<String, Credential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a credential, replacing any with the same id.
    #[must_use]
    pub fn with(mut self, credential: Credential) -> Self {
        self.insert(credential);
        self
    }

    pub fn insert(&mut self, credential: Credential) {
        self.credentials.insert(credential.id.clone(), credential);
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn lookup(&self, id: &str) -> Option<Credential> {
        self.credentials.get(id).cloned()
    }

    fn list_ids(&self) -> Vec<String> {
        self.credentials.keys().cloned().collect()
    }
}

/// A workspace in a fresh temporary directory, removed on drop.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// Create a new temporary workspace.
    ///
    /// Panics if the directory cannot be created.
    pub fn create() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("kubectl-setup-test")
            .tempdir()
            .expect("Failed to create temporary workspace");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A workspace handle rooted in this directory.
    pub fn workspace(&self) -> Workspace {
        Workspace::new(self.dir.path())
    }

    /// Path of a subdirectory that does not exist yet.
    pub fn missing_subdirectory(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Files currently in the workspace root, sorted.
    pub fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

fn pem_block(label: &str, body: &[u8]) -> String {
    format!(
        "-----BEGIN {label}-----\n{}\n-----END {label}-----\n",
        STANDARD.encode(body)
    )
}

/// Bare base64 body of a CA certificate, as users paste it.
///
/// The payload is not DER; only the PEM framing is checked by the crate.
pub fn ca_certificate_body() -> String {
    STANDARD.encode(b"kubectl-setup test certificate authority")
}

/// A PEM client certificate.
pub fn client_certificate_pem() -> String {
    pem_block("CERTIFICATE", b"kubectl-setup test client certificate")
}

/// A PEM (PKCS#8) client key.
pub fn client_key_pem() -> String {
    pem_block("PRIVATE KEY", b"kubectl-setup test client key")
}

/// A complete kubeconfig with cluster `c1`, user `sa` and context `ctx1`.
pub const SERVICE_ACCOUNT_KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
clusters:
- name: c1
  cluster:
    server: https://c1.example.com:6443
    insecure-skip-tls-verify: true
users:
- name: sa
  user:
    token: service-account-token
contexts:
- name: ctx1
  context:
    cluster: c1
    user: sa
- name: ctx2
  context:
    cluster: c1
    user: sa
    namespace: other
current-context: ctx1
"#;
