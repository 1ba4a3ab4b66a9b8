// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KubectlError {
    #[error("No credentials defined to setup Kubernetes CLI")]
    NoCredentialConfigured,

    #[error("No credentials found for id \"{0}\"")]
    CredentialNotFound(String),

    #[error("Unsupported Credentials type {0}")]
    UnsupportedCredentialType(String),

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Failed to parse kubeconfig: {0}")]
    Parse(String),

    #[error("Failed to {operation}: {reason}")]
    DocumentWrite { operation: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KubectlError {
    pub(crate) fn write(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DocumentWrite {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KubectlError>;
