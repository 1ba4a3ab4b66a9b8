// SPDX-License-Identifier: MIT OR Apache-2.0

//! CA certificate handling for cluster entries.
//!
//! Users usually paste the base64 body of a certificate without its PEM
//! armour. [`wrap_certificate`] restores it, and [`CertificateMaterializer`]
//! turns the optional CA into the TLS settings of a cluster entry.
//!
//! When no CA is supplied the cluster is written with
//! `insecure-skip-tls-verify: true`. Callers that need strict verification
//! must supply a certificate.

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{KubectlError, Result};

const BEGIN_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----";
const END_CERTIFICATE: &str = "-----END CERTIFICATE-----";

/// Prefix of temporary CA files.
pub const CA_FILE_PREFIX: &str = "cert-auth";

/// Suffix of temporary CA files.
pub const CA_FILE_SUFFIX: &str = ".crt";

/// TLS trust settings of a cluster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterTls {
    /// Skip server certificate verification.
    InsecureSkipVerify,
    /// Verify the server against this PEM bundle.
    CertificateAuthority(String),
}

/// Add the PEM header and footer to a certificate body when missing.
#[must_use]
pub fn wrap_certificate(certificate: &str) -> String {
    let mut pem = certificate.trim().to_string();
    if !pem.starts_with(BEGIN_CERTIFICATE) {
        pem = format!("{}\n{}", BEGIN_CERTIFICATE, pem);
    }
    if !pem.ends_with(END_CERTIFICATE) {
        pem = format!("{}\n{}", pem, END_CERTIFICATE);
    }
    pem
}

/// Turns CA input into cluster TLS settings and, when a tool needs a file
/// reference, into a scoped temporary file.
#[derive(Debug, Clone, Copy, Default)]
pub struct CertificateMaterializer;

impl CertificateMaterializer {
    /// Create a new materializer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolve the TLS settings for a cluster entry.
    ///
    /// # Errors
    ///
    /// Returns [`KubectlError::InvalidCertificate`] if the CA is present but
    /// does not contain a PEM certificate.
    pub fn cluster_tls(&self, ca_certificate: Option<&str>) -> Result<ClusterTls> {
        match ca_certificate.filter(|ca| !ca.trim().is_empty()) {
            None => Ok(ClusterTls::InsecureSkipVerify),
            Some(ca) => {
                let pem = wrap_certificate(ca);
                ensure_certificates(&pem, "CA certificate")?;
                Ok(ClusterTls::CertificateAuthority(pem))
            }
        }
    }

    /// Write PEM material to a temporary file in `dir`.
    ///
    /// The file is removed when the returned handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn persist(
        &self,
        pem: &str,
        dir: &Path,
        prefix: &str,
        suffix: &str,
    ) -> Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(dir)?;
        file.write_all(pem.as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

/// Check that `pem` holds at least one certificate block.
pub(crate) fn ensure_certificates(pem: &str, what: &str) -> Result<()> {
    let mut reader = std::io::BufReader::new(pem.as_bytes());
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            KubectlError::InvalidCertificate(format!("Failed to parse {}: {}", what, e))
        })?;

    if certs.is_empty() {
        return Err(KubectlError::InvalidCertificate(format!(
            "No certificate found in {}",
            what
        )));
    }
    Ok(())
}

/// Check that `pem` holds a private key.
pub(crate) fn ensure_private_key(pem: &str) -> Result<()> {
    let mut reader = std::io::BufReader::new(pem.as_bytes());
    match rustls_pemfile::private_key(&mut reader) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(KubectlError::InvalidCertificate(
            "No private key found in client key".to_string(),
        )),
        Err(e) => Err(KubectlError::InvalidCertificate(format!(
            "Failed to parse client key: {}",
            e
        ))),
    }
}
