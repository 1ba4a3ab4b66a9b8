// SPDX-License-Identifier: MIT OR Apache-2.0

//! Editing operations on a kubeconfig.
//!
//! The merge protocol is written against [`ConfigEditor`], which mirrors the
//! `kubectl config` subcommands it needs. [`KubeConfig`] implements it by
//! mutating the document in memory; [`KubectlEditor`] runs the real
//! subcommands against a file.

mod kubectl;

pub use kubectl::{KubectlEditor, DEFAULT_KUBECTL_BINARY};

use crate::auth::UserCredential;
use crate::certificate::ClusterTls;
use crate::config::{ContextPatch, KubeConfig};
use crate::error::{KubectlError, Result};

/// The `kubectl config` operations used to write a kubeconfig.
///
/// Calls are applied in order; later calls observe the effect of earlier ones.
pub trait ConfigEditor {
    /// `set-cluster`: create or update a cluster entry.
    fn set_cluster(&mut self, name: &str, server: &str, tls: &ClusterTls) -> Result<()>;

    /// `set-context`: create a context or change the fields set in `patch`.
    fn set_context(&mut self, name: &str, patch: &ContextPatch) -> Result<()>;

    /// `set-credentials`: create or update a user entry.
    fn set_credentials(&mut self, name: &str, credential: &UserCredential) -> Result<()>;

    /// `use-context`: set the current context.
    fn use_context(&mut self, name: &str) -> Result<()>;

    /// `current-context`: read the current context.
    ///
    /// Fails when the document has no current context.
    fn current_context(&mut self) -> Result<String>;
}

impl ConfigEditor for KubeConfig {
    fn set_cluster(&mut self, name: &str, server: &str, tls: &ClusterTls) -> Result<()> {
        self.upsert_cluster(name, server, tls);
        Ok(())
    }

    fn set_context(&mut self, name: &str, patch: &ContextPatch) -> Result<()> {
        KubeConfig::set_context(self, name, patch);
        Ok(())
    }

    fn set_credentials(&mut self, name: &str, credential: &UserCredential) -> Result<()> {
        self.upsert_user(name, credential);
        Ok(())
    }

    fn use_context(&mut self, name: &str) -> Result<()> {
        self.set_current_context(name);
        Ok(())
    }

    fn current_context(&mut self) -> Result<String> {
        KubeConfig::current_context(self)
            .map(str::to_string)
            .ok_or_else(|| KubectlError::write("get current-context", "current-context is not set"))
    }
}
