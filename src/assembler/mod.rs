// SPDX-License-Identifier: MIT OR Apache-2.0

//! Writes the kubeconfig for one unit of work.
//!
//! The resolved credential decides how the document is built:
//!
//! - A credential that already is a kubeconfig is only patched where the
//!   parameters ask for it. In order: switch to the requested context, set
//!   the cluster server, point the current context at the cluster, set the
//!   current context's namespace. Each step runs only if its parameter was
//!   provided.
//! - A bare user credential gets a cluster, a context and a user written
//!   around it, using the default names where none were provided, and the
//!   context becomes current.
//!
//! Steps are applied in order; "current context" means the current context
//! after the first step.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use kubectl_setup::assembler::KubeConfigAssembler;
//! use kubectl_setup::auth::{AuthResult, UserCredential};
//! use kubectl_setup::config::KubectlParameters;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let params = KubectlParameters::builder("deploy-token")
//!     .server_url("https://10.0.0.1:6443")
//!     .build();
//! let auth = AuthResult::ClusterCredential(UserCredential::Token { token: "t0k3n".into() });
//!
//! let config = KubeConfigAssembler::new(params).assemble(&auth, &BTreeMap::new())?;
//! assert_eq!(config.current_context(), Some("k8s"));
//! assert_eq!(config.cluster("k8s").unwrap().server, "https://10.0.0.1:6443");
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::auth::{AuthResolver, AuthResult, CredentialStore, UserCredential};
use crate::certificate::CertificateMaterializer;
use crate::config::{ContextPatch, KubeConfig, KubectlParameters, DEFAULT_USER_NAME};
use crate::editor::{ConfigEditor, KubectlEditor, DEFAULT_KUBECTL_BINARY};
use crate::error::{KubectlError, Result};
use crate::lifecycle::Workspace;
use crate::runtime::{CommandLogger, LoggingConfig};

/// Prefix of written kubeconfig files.
pub const KUBECONFIG_FILE_PREFIX: &str = ".kube";

/// Suffix of written kubeconfig files.
pub const KUBECONFIG_FILE_SUFFIX: &str = "config";

/// How the document is edited.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditorBackend {
    /// Build the document in memory and write it once.
    #[default]
    InMemory,
    /// Run `kubectl config` subcommands against the file.
    Kubectl { binary: PathBuf },
}

impl EditorBackend {
    /// `kubectl` from `PATH`.
    #[must_use]
    pub fn kubectl() -> Self {
        EditorBackend::Kubectl {
            binary: PathBuf::from(DEFAULT_KUBECTL_BINARY),
        }
    }
}

/// Builds and writes a kubeconfig from parameters and a credential.
#[derive(Debug, Clone)]
pub struct KubeConfigAssembler {
    params: KubectlParameters,
    backend: EditorBackend,
    logging: LoggingConfig,
    materializer: CertificateMaterializer,
}

impl KubeConfigAssembler {
    pub fn new(params: KubectlParameters) -> Self {
        Self {
            params,
            backend: EditorBackend::default(),
            logging: LoggingConfig::default(),
            materializer: CertificateMaterializer::new(),
        }
    }

    /// Select how the document is edited.
    #[must_use]
    pub fn with_backend(mut self, backend: EditorBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Configure logging of external commands.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    pub fn params(&self) -> &KubectlParameters {
        &self.params
    }

    pub fn backend(&self) -> &EditorBackend {
        &self.backend
    }

    /// Resolve the credential and write a kubeconfig into the workspace.
    ///
    /// Returns the path of a new, uniquely named file. The caller owns it.
    ///
    /// # Errors
    ///
    /// - [`KubectlError::NoCredentialConfigured`] if no credential id was
    ///   provided; nothing is resolved or written
    /// - resolution errors from `resolver`
    /// - [`KubectlError::DocumentWrite`] if editing or writing fails
    ///
    /// No file is left in the workspace when an error is returned.
    pub fn write_kube_config<S: CredentialStore>(
        &self,
        resolver: &AuthResolver<S>,
        workspace: &Workspace,
    ) -> Result<PathBuf> {
        let credentials_id = self
            .params
            .credentials_id()
            .ok_or(KubectlError::NoCredentialConfigured)?;

        workspace.ensure_exists()?;
        let auth = resolver.resolve(credentials_id)?;

        let mut file = workspace.create_temp_file(KUBECONFIG_FILE_PREFIX, KUBECONFIG_FILE_SUFFIX)?;
        debug!(
            target: "kubectl_setup::assembler",
            "writing kubeconfig {} with {:?} backend",
            file.path().display(),
            self.backend
        );

        match &self.backend {
            EditorBackend::InMemory => {
                let config = self.assemble(&auth, workspace.env())?;
                let yaml = config.to_yaml()?;
                file.write_all(yaml.as_bytes())
                    .and_then(|()| file.flush())
                    .map_err(|e| KubectlError::write("write kubeconfig", e.to_string()))?;
            }
            EditorBackend::Kubectl { binary } => {
                let seed = match &auth {
                    AuthResult::FullDocument { content } => content.clone(),
                    AuthResult::ClusterCredential(_) => KubeConfig::new().to_yaml()?,
                };
                file.write_all(seed.as_bytes())
                    .and_then(|()| file.flush())
                    .map_err(|e| KubectlError::write("write kubeconfig", e.to_string()))?;

                let mut editor = KubectlEditor::new(binary, file.path(), workspace.root())
                    .with_logger(CommandLogger::with_config(self.logging.clone()));
                self.apply(&mut editor, &auth, workspace.env())?;

                match KubeConfig::load_from_path(file.path()) {
                    Ok(written) => report_dangling(&written),
                    Err(e) => debug!(
                        target: "kubectl_setup::assembler",
                        "could not read back {} for validation: {}",
                        file.path().display(),
                        e
                    ),
                }
            }
        }

        let (_, path) = file.keep().map_err(|e| KubectlError::Io(e.error))?;
        info!(target: "kubectl_setup::assembler", "kubeconfig written to {}", path.display());
        Ok(path)
    }

    /// Build the document in memory.
    ///
    /// `env` is used to expand variable references in the server URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential's kubeconfig cannot be parsed or
    /// the CA certificate is invalid.
    pub fn assemble(&self, auth: &AuthResult, env: &BTreeMap<String, String>) -> Result<KubeConfig> {
        let mut config = match auth {
            AuthResult::FullDocument { content } => KubeConfig::from_yaml(content)?,
            AuthResult::ClusterCredential(_) => KubeConfig::new(),
        };
        self.apply(&mut config, auth, env)?;
        report_dangling(&config);
        Ok(config)
    }

    /// Run the merge steps against an editor.
    ///
    /// # Errors
    ///
    /// Returns the first error of the editor; later steps are not run.
    pub fn apply<E: ConfigEditor + ?Sized>(
        &self,
        editor: &mut E,
        auth: &AuthResult,
        env: &BTreeMap<String, String>,
    ) -> Result<()> {
        let server_url = self.params.server_url().map(|url| expand_env(url, env));
        if let Some(server) = &server_url {
            check_server_url(server);
        }

        match auth {
            AuthResult::FullDocument { .. } => self.patch_document(editor, server_url.as_deref()),
            AuthResult::ClusterCredential(credential) => {
                self.synthesize_document(editor, server_url.as_deref(), credential)
            }
        }
    }

    fn patch_document<E: ConfigEditor + ?Sized>(
        &self,
        editor: &mut E,
        server_url: Option<&str>,
    ) -> Result<()> {
        let params = &self.params;
        let tls = server_url
            .map(|_| self.materializer.cluster_tls(params.ca_certificate()))
            .transpose()?;

        if let Some(context) = params.context_name() {
            editor.use_context(context)?;
        }

        if let (Some(server), Some(tls)) = (server_url, &tls) {
            editor.set_cluster(params.effective_cluster_name(), server, tls)?;
        }

        // a new server entry is only reachable if the context points at it
        let context_cluster = match (params.cluster_name(), server_url) {
            (Some(cluster), _) => Some(cluster),
            (None, Some(_)) => Some(params.effective_cluster_name()),
            (None, None) => None,
        };
        if let Some(cluster) = context_cluster {
            let current = editor.current_context()?;
            editor.set_context(&current, &ContextPatch::new().cluster(cluster))?;
        }

        if let Some(namespace) = params.namespace() {
            let current = editor.current_context()?;
            editor.set_context(&current, &ContextPatch::new().namespace(namespace))?;
        }

        Ok(())
    }

    fn synthesize_document<E: ConfigEditor + ?Sized>(
        &self,
        editor: &mut E,
        server_url: Option<&str>,
        credential: &UserCredential,
    ) -> Result<()> {
        let params = &self.params;
        let cluster = params.effective_cluster_name();
        let context = params.effective_context_name();
        let tls = self.materializer.cluster_tls(params.ca_certificate())?;

        editor.set_cluster(cluster, server_url.unwrap_or_default(), &tls)?;

        let mut patch = ContextPatch::new().cluster(cluster).user(DEFAULT_USER_NAME);
        if let Some(namespace) = params.namespace() {
            patch = patch.namespace(namespace);
        }
        editor.set_context(context, &patch)?;

        editor.set_credentials(DEFAULT_USER_NAME, credential)?;
        editor.use_context(context)?;

        Ok(())
    }
}

fn check_server_url(server: &str) {
    if url::Url::parse(server).is_err() {
        warn!(
            target: "kubectl_setup::assembler",
            "server URL \"{}\" is not an absolute URL; kubectl may reject it",
            server
        );
    }
}

// Dangling references are passed through to kubectl, which reports them.
fn report_dangling(config: &KubeConfig) {
    for issue in config.validate() {
        warn!(target: "kubectl_setup::assembler", "kubeconfig: {}", issue);
    }
}

/// Expand `$NAME` and `${NAME}` references from `env`.
///
/// `$$` is a literal `$`. Unknown variables are left as they are.
#[must_use]
pub fn expand_env(input: &str, env: &BTreeMap<String, String>) -> String {
    input
        .split("$$")
        .map(|part| shellexpand::env_with_context_no_errors(part, |name| env.get(name)))
        .collect::<Vec<_>>()
        .join("$")
}
