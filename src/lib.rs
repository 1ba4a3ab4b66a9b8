// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod assembler;
pub mod auth;
pub mod certificate;
pub mod config;
pub mod editor;
pub mod error;
pub mod lifecycle;
pub mod runtime;
pub mod testkit;

pub use assembler::{EditorBackend, KubeConfigAssembler};
pub use auth::{AuthResolver, AuthResult, CredentialStore, UserCredential};
pub use config::{KubeConfig, KubectlParameters};
pub use error::KubectlError;
pub use lifecycle::{BuildContext, CleanupDisposer, KubectlBuildWrapper, Workspace};
