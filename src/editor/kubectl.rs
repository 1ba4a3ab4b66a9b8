// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`ConfigEditor`] backed by the `kubectl config` subcommands.
//!
//! Each operation runs `kubectl` with `KUBECONFIG` pointing at the target
//! file. Certificate material is handed over through temporary files that
//! are removed as soon as the command returns; `--embed-certs` copies their
//! content into the document.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::NamedTempFile;

use super::ConfigEditor;
use crate::auth::UserCredential;
use crate::certificate::{CertificateMaterializer, ClusterTls, CA_FILE_PREFIX, CA_FILE_SUFFIX};
use crate::config::{ContextPatch, ENV_KUBECONFIG};
use crate::error::{KubectlError, Result};
use crate::runtime::CommandLogger;

/// Binary looked up on `PATH` by default.
pub const DEFAULT_KUBECTL_BINARY: &str = "kubectl";

/// Runs `kubectl config` against one kubeconfig file.
#[derive(Debug, Clone)]
pub struct KubectlEditor {
    binary: PathBuf,
    kubeconfig: PathBuf,
    scratch_dir: PathBuf,
    materializer: CertificateMaterializer,
    logger: CommandLogger,
}

impl KubectlEditor {
    /// Create an editor for `kubeconfig`, writing temporary certificate
    /// files to `scratch_dir`.
    pub fn new(
        binary: impl Into<PathBuf>,
        kubeconfig: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            binary: binary.into(),
            kubeconfig: kubeconfig.into(),
            scratch_dir: scratch_dir.into(),
            materializer: CertificateMaterializer::new(),
            logger: CommandLogger::new(),
        }
    }

    /// Use a custom command logger.
    #[must_use]
    pub fn with_logger(mut self, logger: CommandLogger) -> Self {
        self.logger = logger;
        self
    }

    /// The file being edited.
    pub fn kubeconfig(&self) -> &Path {
        &self.kubeconfig
    }

    /// Run `kubectl` and return its trimmed stdout.
    fn run(&self, operation: &str, args: &[String]) -> Result<String> {
        let program = self.binary.display().to_string();
        let span = self.logger.start(&program, args);

        let output = Command::new(&self.binary)
            .args(args)
            .env(ENV_KUBECONFIG, &self.kubeconfig)
            .stdin(Stdio::null())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                let reason = format!("could not run {}: {}", program, e);
                self.logger.finish_error(span, &reason);
                return Err(KubectlError::write(operation, reason));
            }
        };

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |code| code.to_string());
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = format!("exit code {}: {}", code, stderr.trim());
            self.logger.finish_error(span, &reason);
            return Err(KubectlError::write(operation, reason));
        }

        self.logger.finish_success(span);
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn persist(&self, pem: &str, prefix: &str, suffix: &str) -> Result<NamedTempFile> {
        self.materializer
            .persist(pem, &self.scratch_dir, prefix, suffix)
    }
}

pub(crate) fn set_cluster_args(name: &str, server: &str, ca_file: Option<&Path>) -> Vec<String> {
    let mut args = vec![
        "config".to_string(),
        "set-cluster".to_string(),
        name.to_string(),
        format!("--server={}", server),
    ];
    match ca_file {
        Some(path) => {
            args.push("--embed-certs=true".to_string());
            args.push(format!("--certificate-authority={}", path.display()));
        }
        None => args.push("--insecure-skip-tls-verify=true".to_string()),
    }
    args
}

pub(crate) fn set_context_args(name: &str, patch: &ContextPatch) -> Vec<String> {
    let mut args = vec![
        "config".to_string(),
        "set-context".to_string(),
        name.to_string(),
    ];
    if let Some(cluster) = &patch.cluster {
        args.push(format!("--cluster={}", cluster));
    }
    if let Some(user) = &patch.user {
        args.push(format!("--user={}", user));
    }
    if let Some(namespace) = &patch.namespace {
        args.push(format!("--namespace={}", namespace));
    }
    args
}

pub(crate) fn set_credentials_args(
    name: &str,
    credential: &UserCredential,
    cert_files: Option<(&Path, &Path)>,
) -> Vec<String> {
    let mut args = vec![
        "config".to_string(),
        "set-credentials".to_string(),
        name.to_string(),
    ];
    match (credential, cert_files) {
        (UserCredential::Token { token }, _) => args.push(format!("--token={}", token)),
        (UserCredential::BasicAuth { username, password }, _) => {
            args.push(format!("--username={}", username));
            args.push(format!("--password={}", password));
        }
        (UserCredential::ClientCertificate { .. }, Some((cert, key))) => {
            args.push(format!("--client-certificate={}", cert.display()));
            args.push(format!("--client-key={}", key.display()));
            args.push("--embed-certs=true".to_string());
        }
        (UserCredential::ClientCertificate { .. }, None) => {}
    }
    args
}

impl ConfigEditor for KubectlEditor {
    fn set_cluster(&mut self, name: &str, server: &str, tls: &ClusterTls) -> Result<()> {
        // the CA file must outlive the command
        let ca_file = match tls {
            ClusterTls::InsecureSkipVerify => None,
            ClusterTls::CertificateAuthority(pem) => {
                Some(self.persist(pem, CA_FILE_PREFIX, CA_FILE_SUFFIX)?)
            }
        };
        let args = set_cluster_args(name, server, ca_file.as_ref().map(|f| f.path()));
        self.run("add kubectl cluster", &args).map(drop)
    }

    fn set_context(&mut self, name: &str, patch: &ContextPatch) -> Result<()> {
        let operation = if patch.namespace.is_some() && patch.cluster.is_none() {
            "set kubectl context namespace"
        } else if patch.user.is_none() {
            "set kubectl context cluster"
        } else {
            "add kubectl context"
        };
        self.run(operation, &set_context_args(name, patch)).map(drop)
    }

    fn set_credentials(&mut self, name: &str, credential: &UserCredential) -> Result<()> {
        let files = match credential {
            UserCredential::ClientCertificate { certificate, key } => Some((
                self.persist(certificate, "client", ".crt")?,
                self.persist(key, "client", ".key")?,
            )),
            _ => None,
        };
        let args = set_credentials_args(
            name,
            credential,
            files.as_ref().map(|(cert, key)| (cert.path(), key.path())),
        );
        self.run("add kubectl credentials", &args).map(drop)
    }

    fn use_context(&mut self, name: &str) -> Result<()> {
        let args = vec![
            "config".to_string(),
            "use-context".to_string(),
            name.to_string(),
        ];
        self.run("set kubectl current context", &args).map(drop)
    }

    fn current_context(&mut self) -> Result<String> {
        let args = vec!["config".to_string(), "current-context".to_string()];
        let current = self.run("get kubectl current-context", &args)?;
        if current.is_empty() {
            return Err(KubectlError::write(
                "get kubectl current-context",
                "current-context is not set",
            ));
        }
        Ok(current)
    }
}
