// SPDX-License-Identifier: MIT OR Apache-2.0

//! Build lifecycle integration
//!
//! A build host calls [`KubectlBuildWrapper::set_up`] once before the unit of
//! work, exports the variables of the returned [`BuildContext`] to it, and
//! calls [`BuildContext::tear_down`] once afterwards, whatever the outcome.
//! Teardown deletes the kubeconfig through a [`CleanupDisposer`].
//!
//! # Example
//!
//! ```no_run
//! use kubectl_setup::auth::AuthResolver;
//! use kubectl_setup::config::KubectlParameters;
//! use kubectl_setup::lifecycle::{KubectlBuildWrapper, Workspace};
//! use kubectl_setup::testkit::MemoryCredentialStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = AuthResolver::new(MemoryCredentialStore::new());
//! let wrapper = KubectlBuildWrapper::new(KubectlParameters::builder("deploy-token").build());
//! let workspace = Workspace::new("/var/lib/ci/workspace/job");
//!
//! let status = wrapper.with_kubeconfig(&workspace, &resolver, |context| {
//!     std::process::Command::new("kubectl")
//!         .arg("get")
//!         .arg("pods")
//!         .envs(context.env())
//!         .status()
//! })?;
//! # let _ = status;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::assembler::{EditorBackend, KubeConfigAssembler};
use crate::auth::{AuthResolver, CredentialStore};
use crate::config::{KubectlParameters, ENV_KUBECONFIG};
use crate::error::Result;
use crate::runtime::LoggingConfig;

/// Directory a unit of work runs in, with its environment.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    env: BTreeMap<String, String>,
}

impl Workspace {
    /// Create a workspace handle. The directory does not need to exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            env: BTreeMap::new(),
        }
    }

    /// Set a build environment variable.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Set several build environment variables.
    #[must_use]
    pub fn with_env<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build environment used to expand variable references.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Create the workspace directory if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure_exists(&self) -> Result<()> {
        if !self.root.exists() {
            info!(target: "kubectl_setup::assembler", "creating missing workspace to write kubeconfig");
            std::fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }

    /// Create a uniquely named file in the workspace.
    ///
    /// The file is deleted when the handle is dropped unless it is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create_temp_file(&self, prefix: &str, suffix: &str) -> Result<NamedTempFile> {
        Ok(tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(&self.root)?)
    }

    /// Delete a file, relative to the workspace root unless absolute.
    pub fn delete(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::remove_file(self.root.join(path))
    }
}

/// Runs once when the unit of work is over.
pub trait Disposer: Send {
    fn tear_down(&mut self);
}

/// Deletes the written kubeconfig from its workspace on teardown.
///
/// Dropping an armed disposer has the same effect as tearing it down, so the
/// file is removed even if the host never calls teardown.
#[derive(Debug)]
pub struct CleanupDisposer {
    workspace: Workspace,
    file: PathBuf,
    armed: bool,
}

impl CleanupDisposer {
    /// `file` is resolved against the workspace root unless absolute.
    pub fn new(workspace: Workspace, file: impl Into<PathBuf>) -> Self {
        Self {
            workspace,
            file: file.into(),
            armed: true,
        }
    }

    /// The file that will be removed.
    pub fn file(&self) -> &Path {
        &self.file
    }

    fn remove(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;

        match self.workspace.delete(&self.file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(target: "kubectl_setup::cleanup", "{} was already removed", self.file.display());
            }
            Err(e) => {
                warn!(
                    target: "kubectl_setup::cleanup",
                    "failed to remove kubectl configuration {}: {}",
                    self.file.display(),
                    e
                );
                return;
            }
        }
        info!(target: "kubectl_setup::cleanup", "kubectl configuration cleaned up");
    }
}

impl Disposer for CleanupDisposer {
    fn tear_down(&mut self) {
        self.remove();
    }
}

impl Drop for CleanupDisposer {
    fn drop(&mut self) {
        self.remove();
    }
}

/// What set-up hands to the build host.
pub struct BuildContext {
    env: BTreeMap<String, String>,
    disposer: Option<Box<dyn Disposer>>,
}

impl BuildContext {
    fn new() -> Self {
        Self {
            env: BTreeMap::new(),
            disposer: None,
        }
    }

    fn set_env(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.env.insert(name.into(), value.into());
    }

    fn set_disposer(&mut self, disposer: impl Disposer + 'static) {
        self.disposer = Some(Box::new(disposer));
    }

    /// Variables to export to the unit of work.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Path of the written kubeconfig.
    pub fn kubeconfig(&self) -> Option<&Path> {
        self.env.get(ENV_KUBECONFIG).map(Path::new)
    }

    /// Run the registered disposer.
    pub fn tear_down(mut self) {
        if let Some(mut disposer) = self.disposer.take() {
            disposer.tear_down();
        }
    }
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("env", &self.env)
            .field("disposer", &self.disposer.is_some())
            .finish()
    }
}

/// Configures `kubectl` for the duration of a unit of work.
#[derive(Debug, Clone)]
pub struct KubectlBuildWrapper {
    assembler: KubeConfigAssembler,
}

impl KubectlBuildWrapper {
    pub fn new(params: KubectlParameters) -> Self {
        Self {
            assembler: KubeConfigAssembler::new(params),
        }
    }

    /// Select how the kubeconfig is edited.
    #[must_use]
    pub fn with_backend(mut self, backend: EditorBackend) -> Self {
        self.assembler = self.assembler.with_backend(backend);
        self
    }

    /// Configure logging of external commands.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.assembler = self.assembler.with_logging(logging);
        self
    }

    /// Write the kubeconfig and register its removal.
    ///
    /// # Errors
    ///
    /// Returns any error of [`KubeConfigAssembler::write_kube_config`]; no
    /// file is left behind in that case.
    pub fn set_up<S: CredentialStore>(
        &self,
        workspace: &Workspace,
        resolver: &AuthResolver<S>,
    ) -> Result<BuildContext> {
        let config_file = self.assembler.write_kube_config(resolver, workspace)?;

        let mut context = BuildContext::new();
        context.set_env(ENV_KUBECONFIG, config_file.to_string_lossy());
        context.set_disposer(CleanupDisposer::new(workspace.clone(), config_file));
        Ok(context)
    }

    /// Run `work` between set-up and teardown.
    ///
    /// Teardown runs whatever `work` returns.
    ///
    /// # Errors
    ///
    /// Returns an error if set-up fails, in which case `work` is not run.
    pub fn with_kubeconfig<S, T, F>(
        &self,
        workspace: &Workspace,
        resolver: &AuthResolver<S>,
        work: F,
    ) -> Result<T>
    where
        S: CredentialStore,
        F: FnOnce(&BuildContext) -> T,
    {
        let context = self.set_up(workspace, resolver)?;
        let outcome = work(&context);
        context.tear_down();
        Ok(outcome)
    }
}
