// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job parameters for writing a kubeconfig
//!
//! Every field is optional except the credential id. A field set to an
//! empty string counts as not provided.
//!
//! # Example
//!
//! ```
//! use kubectl_setup::config::KubectlParameters;
//!
//! let params = KubectlParameters::builder("deploy-token")
//!     .server_url("https://10.0.0.1:6443")
//!     .namespace("team-a")
//!     .build();
//!
//! assert_eq!(params.effective_cluster_name(), "k8s");
//! assert_eq!(params.namespace(), Some("team-a"));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{KubectlError, Result};

/// Cluster name used when none is provided.
pub const DEFAULT_CLUSTER_NAME: &str = "k8s";

/// Context name used when none is provided.
pub const DEFAULT_CONTEXT_NAME: &str = "k8s";

/// User entry name written for bare credentials.
pub const DEFAULT_USER_NAME: &str = "cluster-admin";

/// Parameters of one kubeconfig assembly
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KubectlParameters {
    /// API server URL; may reference build environment variables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,

    /// Id of the credential to resolve
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_id: Option<String>,

    /// CA certificate, with or without PEM armour
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_certificate: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

fn provided(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl KubectlParameters {
    /// Create a builder.
    #[must_use]
    pub fn builder(credentials_id: impl Into<String>) -> KubectlParametersBuilder {
        KubectlParametersBuilder::new(credentials_id)
    }

    /// Parse parameters from YAML (or JSON)
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| KubectlError::Parse(format!("Failed to parse parameters: {}", e)))
    }

    pub fn server_url(&self) -> Option<&str> {
        provided(&self.server_url)
    }

    pub fn credentials_id(&self) -> Option<&str> {
        provided(&self.credentials_id)
    }

    pub fn ca_certificate(&self) -> Option<&str> {
        provided(&self.ca_certificate)
    }

    pub fn cluster_name(&self) -> Option<&str> {
        provided(&self.cluster_name)
    }

    pub fn context_name(&self) -> Option<&str> {
        provided(&self.context_name)
    }

    pub fn namespace(&self) -> Option<&str> {
        provided(&self.namespace)
    }

    /// The provided cluster name, or [`DEFAULT_CLUSTER_NAME`].
    pub fn effective_cluster_name(&self) -> &str {
        self.cluster_name().unwrap_or(DEFAULT_CLUSTER_NAME)
    }

    /// The provided context name, or [`DEFAULT_CONTEXT_NAME`].
    pub fn effective_context_name(&self) -> &str {
        self.context_name().unwrap_or(DEFAULT_CONTEXT_NAME)
    }
}

/// Builder for `KubectlParameters`.
#[derive(Debug, Clone)]
pub struct KubectlParametersBuilder {
    params: KubectlParameters,
}

impl KubectlParametersBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new(credentials_id: impl Into<String>) -> Self {
        Self {
            params: KubectlParameters {
                credentials_id: Some(credentials_id.into()),
                ..Default::default()
            },
        }
    }

    /// Set the API server URL.
    #[must_use]
    pub fn server_url(mut self, server_url: impl Into<String>) -> Self {
        self.params.server_url = Some(server_url.into());
        self
    }

    /// Set the CA certificate.
    #[must_use]
    pub fn ca_certificate(mut self, ca_certificate: impl Into<String>) -> Self {
        self.params.ca_certificate = Some(ca_certificate.into());
        self
    }

    /// Set the cluster name.
    #[must_use]
    pub fn cluster_name(mut self, cluster_name: impl Into<String>) -> Self {
        self.params.cluster_name = Some(cluster_name.into());
        self
    }

    /// Set the context name.
    #[must_use]
    pub fn context_name(mut self, context_name: impl Into<String>) -> Self {
        self.params.context_name = Some(context_name.into());
        self
    }

    /// Set the namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.params.namespace = Some(namespace.into());
        self
    }

    /// Build the parameters.
    #[must_use]
    pub fn build(self) -> KubectlParameters {
        self.params
    }
}
