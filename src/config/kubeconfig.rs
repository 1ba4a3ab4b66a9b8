// SPDX-License-Identifier: MIT OR Apache-2.0

//! Kubeconfig document model
//!
//! This module provides an in-memory representation of the kubeconfig file
//! consumed by `kubectl`, together with the handful of mutations needed to
//! write one: upserting clusters, contexts and users, and switching the
//! current context.
//!
//! Unknown keys are kept at every level, so a document loaded from a
//! credential survives a deserialize/serialize round trip unchanged.
//!
//! # Example
//!
//! ```
//! use kubectl_setup::certificate::ClusterTls;
//! use kubectl_setup::config::{ContextPatch, KubeConfig};
//!
//! let mut config = KubeConfig::new();
//! config.upsert_cluster("k8s", "https://10.0.0.1:6443", &ClusterTls::InsecureSkipVerify);
//! config.set_context("k8s", &ContextPatch::new().cluster("k8s").user("cluster-admin"));
//! config.set_current_context("k8s");
//!
//! assert_eq!(config.current_context(), Some("k8s"));
//! assert!(config.validate().is_empty());
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::auth::UserCredential;
use crate::certificate::ClusterTls;
use crate::error::{KubectlError, Result};

/// `apiVersion` written into new documents.
pub const API_VERSION: &str = "v1";

/// `kind` written into new documents.
pub const KIND: &str = "Config";

type Extra = BTreeMap<String, serde_yaml::Value>;

/// Represents an entire kubeconfig file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct KubeConfig {
    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub clusters: Vec<NamedCluster>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub contexts: Vec<NamedContext>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub users: Vec<NamedUser>,

    /// The currently active context name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_context: Option<String>,

    /// Any other top-level keys (`preferences`, `extensions`, ...)
    #[serde(flatten)]
    pub extra: Extra,
}

/// A cluster entry, keyed by name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: Cluster,
}

/// Server endpoint and TLS trust settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    #[serde(default)]
    pub server: String,

    /// Base64-encoded PEM bundle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,

    /// Path to a PEM file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure_skip_tls_verify: Option<bool>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// A context entry, keyed by name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedContext {
    pub name: String,
    pub context: Context,
}

/// Binds a cluster, a user and an optional namespace together
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Context {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(flatten)]
    pub extra: Extra,
}

/// A user entry, keyed by name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedUser {
    pub name: String,
    pub user: User,
}

/// Authentication material for one identity
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate_data: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key_data: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// `exec`, `auth-provider` and friends
    #[serde(flatten)]
    pub extra: Extra,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("User")
            .field("client_certificate_data", &redact(&self.client_certificate_data))
            .field("client_key_data", &redact(&self.client_key_data))
            .field("client_certificate", &self.client_certificate)
            .field("client_key", &self.client_key)
            .field("token", &redact(&self.token))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Fields to change on a context. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextPatch {
    pub cluster: Option<String>,
    pub user: Option<String>,
    pub namespace: Option<String>,
}

impl ContextPatch {
    /// Create an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the context at a cluster.
    #[must_use]
    pub fn cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }

    /// Point the context at a user.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the context's default namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// A reference in the document that names a missing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DanglingReference {
    /// `current-context` names a context that does not exist.
    CurrentContext(String),
    /// A context names a cluster that does not exist.
    ContextCluster { context: String, cluster: String },
    /// A context names a user that does not exist.
    ContextUser { context: String, user: String },
}

impl fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DanglingReference::CurrentContext(name) => {
                write!(f, "current-context \"{}\" does not exist", name)
            }
            DanglingReference::ContextCluster { context, cluster } => {
                write!(f, "context \"{}\" references missing cluster \"{}\"", context, cluster)
            }
            DanglingReference::ContextUser { context, user } => {
                write!(f, "context \"{}\" references missing user \"{}\"", context, user)
            }
        }
    }
}

impl Default for KubeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl KubeConfig {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            clusters: Vec::new(),
            contexts: Vec::new(),
            users: Vec::new(),
            current_context: None,
            extra: Extra::new(),
        }
    }

    /// Parse a document from YAML
    ///
    /// An empty or whitespace-only string yields an empty document.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::new());
        }
        serde_yaml::from_str(yaml)
            .map_err(|e| KubectlError::Parse(format!("Failed to parse kubeconfig YAML: {}", e)))
    }

    /// Serialize the document to YAML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| KubectlError::write("serialize kubeconfig", e.to_string()))
    }

    /// Load a document from a file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file is malformed YAML
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            KubectlError::Parse(format!(
                "Failed to read kubeconfig {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Write the document to a file, replacing its content
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized or written
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml).map_err(|e| {
            KubectlError::write(
                format!("write kubeconfig {}", path.as_ref().display()),
                e.to_string(),
            )
        })
    }

    /// Get the current context name
    ///
    /// An empty `current-context` is treated as unset.
    pub fn current_context(&self) -> Option<&str> {
        self.current_context.as_deref().filter(|name| !name.is_empty())
    }

    /// Set the current context. The context does not need to exist.
    pub fn set_current_context(&mut self, name: impl Into<String>) {
        self.current_context = Some(name.into());
    }

    /// Get a cluster by name
    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.cluster)
    }

    /// Get a context by name
    pub fn context(&self, name: &str) -> Option<&Context> {
        self.contexts
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.context)
    }

    /// Get a user by name
    pub fn user(&self, name: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.user)
    }

    /// Get the context named by `current-context`, if it exists
    pub fn active_context(&self) -> Option<&Context> {
        self.current_context().and_then(|name| self.context(name))
    }

    /// Create or update a cluster entry
    ///
    /// The server is always replaced. TLS settings are made consistent with
    /// `tls`: a CA clears `insecure-skip-tls-verify`, insecure mode clears any
    /// CA. Other keys of an existing entry are kept.
    pub fn upsert_cluster(&mut self, name: &str, server: &str, tls: &ClusterTls) {
        let cluster = self.cluster_mut(name);
        cluster.server = server.to_string();
        match tls {
            ClusterTls::InsecureSkipVerify => {
                cluster.insecure_skip_tls_verify = Some(true);
                cluster.certificate_authority = None;
                cluster.certificate_authority_data = None;
            }
            ClusterTls::CertificateAuthority(pem) => {
                cluster.certificate_authority_data = Some(STANDARD.encode(pem.as_bytes()));
                cluster.certificate_authority = None;
                cluster.insecure_skip_tls_verify = None;
            }
        }
    }

    /// Create a context or change the fields set in `patch`
    pub fn set_context(&mut self, name: &str, patch: &ContextPatch) {
        let context = self.context_mut(name);
        if let Some(cluster) = &patch.cluster {
            context.cluster = cluster.clone();
        }
        if let Some(user) = &patch.user {
            context.user = user.clone();
        }
        if let Some(namespace) = &patch.namespace {
            context.namespace = Some(namespace.clone());
        }
    }

    /// Create a user or set the authentication material of `credential` on it
    ///
    /// Fields unrelated to the credential kind are left as they are.
    pub fn upsert_user(&mut self, name: &str, credential: &UserCredential) {
        let user = self.user_mut(name);
        match credential {
            UserCredential::Token { token } => {
                user.token = Some(token.clone());
            }
            UserCredential::BasicAuth { username, password } => {
                user.username = Some(username.clone());
                user.password = Some(password.clone());
            }
            UserCredential::ClientCertificate { certificate, key } => {
                user.client_certificate_data = Some(STANDARD.encode(certificate.as_bytes()));
                user.client_key_data = Some(STANDARD.encode(key.as_bytes()));
                user.client_certificate = None;
                user.client_key = None;
            }
        }
    }

    /// List references to entries that do not exist
    ///
    /// An empty result means every context points at present entries and
    /// `current-context`, when set, names a present context.
    pub fn validate(&self) -> Vec<DanglingReference> {
        let mut issues = Vec::new();

        if let Some(current) = self.current_context() {
            if self.context(current).is_none() {
                issues.push(DanglingReference::CurrentContext(current.to_string()));
            }
        }

        for entry in &self.contexts {
            let context = &entry.context;
            if !context.cluster.is_empty() && self.cluster(&context.cluster).is_none() {
                issues.push(DanglingReference::ContextCluster {
                    context: entry.name.clone(),
                    cluster: context.cluster.clone(),
                });
            }
            if !context.user.is_empty() && self.user(&context.user).is_none() {
                issues.push(DanglingReference::ContextUser {
                    context: entry.name.clone(),
                    user: context.user.clone(),
                });
            }
        }

        issues
    }

    fn cluster_mut(&mut self, name: &str) -> &mut Cluster {
        let index = match self.clusters.iter().position(|entry| entry.name == name) {
            Some(index) => index,
            None => {
                self.clusters.push(NamedCluster {
                    name: name.to_string(),
                    cluster: Cluster::default(),
                });
                self.clusters.len() - 1
            }
        };
        &mut self.clusters[index].cluster
    }

    fn context_mut(&mut self, name: &str) -> &mut Context {
        let index = match self.contexts.iter().position(|entry| entry.name == name) {
            Some(index) => index,
            None => {
                self.contexts.push(NamedContext {
                    name: name.to_string(),
                    context: Context::default(),
                });
                self.contexts.len() - 1
            }
        };
        &mut self.contexts[index].context
    }

    fn user_mut(&mut self, name: &str) -> &mut User {
        let index = match self.users.iter().position(|entry| entry.name == name) {
            Some(index) => index,
            None => {
                self.users.push(NamedUser {
                    name: name.to_string(),
                    user: User::default(),
                });
                self.users.len() - 1
            }
        };
        &mut self.users[index].user
    }
}

impl Cluster {
    /// Decode `certificate-authority-data` back to PEM text.
    pub fn certificate_authority_pem(&self) -> Option<String> {
        self.certificate_authority_data
            .as_ref()
            .and_then(|data| STANDARD.decode(data).ok())
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }

    /// Whether TLS verification is disabled for this cluster.
    pub fn is_insecure(&self) -> bool {
        self.insecure_skip_tls_verify.unwrap_or(false)
    }
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND.to_string()
}

// kubectl writes `clusters: null` for empty lists
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
