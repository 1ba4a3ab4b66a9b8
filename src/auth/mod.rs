// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential resolution
//!
//! A credential store hands out raw [`Secret`]s by id. The
//! [`ConverterRegistry`] turns each secret kind into an [`AuthResult`]: either
//! a complete kubeconfig carried by the credential, or a bare user identity
//! that still needs a cluster and context around it.
//!
//! # Example
//!
//! ```
//! use kubectl_setup::auth::{AuthResolver, AuthResult, Credential, Secret};
//! use kubectl_setup::testkit::MemoryCredentialStore;
//!
//! let store = MemoryCredentialStore::new()
//!     .with(Credential::new("deploy-token", Secret::StringSecret { secret: "t0k3n".into() }));
//! let resolver = AuthResolver::new(store);
//!
//! assert!(matches!(
//!     resolver.resolve("deploy-token").unwrap(),
//!     AuthResult::ClusterCredential(_)
//! ));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::certificate::{ensure_certificates, ensure_private_key};
use crate::error::{KubectlError, Result};

/// Kind of [`Secret::StringSecret`].
pub const KIND_STRING: &str = "string";
/// Kind of [`Secret::UsernamePassword`].
pub const KIND_USERNAME_PASSWORD: &str = "username-password";
/// Kind of [`Secret::Certificate`].
pub const KIND_CERTIFICATE: &str = "certificate";
/// Kind of [`Secret::KubeconfigFile`].
pub const KIND_KUBECONFIG_FILE: &str = "kubeconfig-file";

/// Authentication resolved from a credential.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthResult {
    /// The credential is a complete kubeconfig.
    FullDocument { content: String },
    /// The credential is only a user identity.
    ClusterCredential(UserCredential),
}

impl fmt::Debug for AuthResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthResult::FullDocument { content } => f
                .debug_struct("FullDocument")
                .field("bytes", &content.len())
                .finish(),
            AuthResult::ClusterCredential(credential) => f
                .debug_tuple("ClusterCredential")
                .field(credential)
                .finish(),
        }
    }
}

/// User identity material written into a `users` entry.
#[derive(Clone, PartialEq, Eq)]
pub enum UserCredential {
    /// Bearer token.
    Token { token: String },
    /// HTTP basic authentication.
    BasicAuth { username: String, password: String },
    /// Client certificate and private key, both PEM.
    ClientCertificate { certificate: String, key: String },
}

impl UserCredential {
    /// Short name of the authentication scheme.
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        match self {
            UserCredential::Token { .. } => "token",
            UserCredential::BasicAuth { .. } => "basic-auth",
            UserCredential::ClientCertificate { .. } => "client-certificate",
        }
    }
}

impl fmt::Debug for UserCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserCredential::Token { .. } => f
                .debug_struct("Token")
                .field("token", &"[REDACTED]")
                .finish(),
            UserCredential::BasicAuth { username, .. } => f
                .debug_struct("BasicAuth")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            UserCredential::ClientCertificate { .. } => f
                .debug_struct("ClientCertificate")
                .field("certificate", &"[PEM]")
                .field("key", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Raw secret as stored by the credential store.
#[derive(Clone, PartialEq, Eq)]
pub enum Secret {
    /// Secret text, used as a bearer token.
    StringSecret { secret: String },
    /// Username and password.
    UsernamePassword { username: String, password: String },
    /// Client certificate and key in PEM format.
    Certificate { certificate: String, key: String },
    /// A kubeconfig file.
    KubeconfigFile { content: String },
    /// Any other kind of secret, convertible only through a registered converter.
    Other {
        kind: String,
        fields: BTreeMap<String, String>,
    },
}

impl Secret {
    /// The kind used to select a converter.
    pub fn kind(&self) -> &str {
        match self {
            Secret::StringSecret { .. } => KIND_STRING,
            Secret::UsernamePassword { .. } => KIND_USERNAME_PASSWORD,
            Secret::Certificate { .. } => KIND_CERTIFICATE,
            Secret::KubeconfigFile { .. } => KIND_KUBECONFIG_FILE,
            Secret::Other { kind, .. } => kind,
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Secret::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .finish_non_exhaustive(),
            Secret::Other { kind, fields } => f
                .debug_struct("Other")
                .field("kind", kind)
                .field("fields", &fields.keys().collect::<Vec<_>>())
                .finish(),
            other => f
                .debug_struct("Secret")
                .field("kind", &other.kind())
                .finish_non_exhaustive(),
        }
    }
}

/// A stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub description: Option<String>,
    pub secret: Secret,
}

impl Credential {
    /// Create a credential without description.
    #[must_use]
    pub fn new(id: impl Into<String>, secret: Secret) -> Self {
        Self {
            id: id.into(),
            description: None,
            secret,
        }
    }

    /// Attach a human readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Lookup side of a credential store.
pub trait CredentialStore {
    /// Find a credential by id.
    fn lookup(&self, id: &str) -> Option<Credential>;

    /// All credential ids known to the store.
    fn list_ids(&self) -> Vec<String>;
}

impl<S: CredentialStore + ?Sized> CredentialStore for &S {
    fn lookup(&self, id: &str) -> Option<Credential> {
        (**self).lookup(id)
    }

    fn list_ids(&self) -> Vec<String> {
        (**self).list_ids()
    }
}

/// Converts one kind of secret.
pub type Converter = fn(&Secret) -> Result<AuthResult>;

/// Converters keyed by secret kind.
#[derive(Clone)]
pub struct ConverterRegistry {
    converters: HashMap<String, Converter>,
}

impl ConverterRegistry {
    /// Create a registry without any converter.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// Register (or replace) the converter for `kind`.
    #[must_use]
    pub fn register(mut self, kind: impl Into<String>, converter: Converter) -> Self {
        self.converters.insert(kind.into(), converter);
        self
    }

    /// Whether a converter exists for `kind`.
    #[must_use]
    pub fn supports(&self, kind: &str) -> bool {
        self.converters.contains_key(kind)
    }

    /// Convert a secret.
    ///
    /// # Errors
    ///
    /// Returns [`KubectlError::UnsupportedCredentialType`] if no converter is
    /// registered for the secret's kind, or the converter's own error.
    pub fn convert(&self, secret: &Secret) -> Result<AuthResult> {
        let converter = self
            .converters
            .get(secret.kind())
            .ok_or_else(|| KubectlError::UnsupportedCredentialType(secret.kind().to_string()))?;
        converter(secret)
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::empty()
            .register(KIND_STRING, convert_string)
            .register(KIND_USERNAME_PASSWORD, convert_username_password)
            .register(KIND_CERTIFICATE, convert_certificate)
            .register(KIND_KUBECONFIG_FILE, convert_kubeconfig_file)
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.converters.keys().collect();
        kinds.sort();
        f.debug_struct("ConverterRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

fn unsupported(secret: &Secret) -> KubectlError {
    KubectlError::UnsupportedCredentialType(secret.kind().to_string())
}

fn convert_string(secret: &Secret) -> Result<AuthResult> {
    match secret {
        Secret::StringSecret { secret } if !secret.trim().is_empty() => {
            Ok(AuthResult::ClusterCredential(UserCredential::Token {
                token: secret.trim().to_string(),
            }))
        }
        Secret::StringSecret { .. } => Err(KubectlError::InvalidCredential(
            "secret text is empty".to_string(),
        )),
        other => Err(unsupported(other)),
    }
}

fn convert_username_password(secret: &Secret) -> Result<AuthResult> {
    match secret {
        Secret::UsernamePassword { username, password } => {
            Ok(AuthResult::ClusterCredential(UserCredential::BasicAuth {
                username: username.clone(),
                password: password.clone(),
            }))
        }
        other => Err(unsupported(other)),
    }
}

fn convert_certificate(secret: &Secret) -> Result<AuthResult> {
    match secret {
        Secret::Certificate { certificate, key } => {
            ensure_certificates(certificate, "client certificate")?;
            ensure_private_key(key)?;
            Ok(AuthResult::ClusterCredential(
                UserCredential::ClientCertificate {
                    certificate: certificate.clone(),
                    key: key.clone(),
                },
            ))
        }
        other => Err(unsupported(other)),
    }
}

fn convert_kubeconfig_file(secret: &Secret) -> Result<AuthResult> {
    match secret {
        Secret::KubeconfigFile { content } => Ok(AuthResult::FullDocument {
            content: content.clone(),
        }),
        other => Err(unsupported(other)),
    }
}

/// Resolves credential ids into [`AuthResult`]s.
#[derive(Debug)]
pub struct AuthResolver<S> {
    store: S,
    registry: ConverterRegistry,
}

impl<S: CredentialStore> AuthResolver<S> {
    /// Create a resolver with the built-in converters.
    pub fn new(store: S) -> Self {
        Self::with_registry(store, ConverterRegistry::default())
    }

    /// Create a resolver with a custom converter registry.
    pub fn with_registry(store: S, registry: ConverterRegistry) -> Self {
        Self { store, registry }
    }

    /// Get the converter registry.
    pub fn registry(&self) -> &ConverterRegistry {
        &self.registry
    }

    /// Resolve a credential id.
    ///
    /// # Errors
    ///
    /// - [`KubectlError::CredentialNotFound`] if the store does not know `id`
    /// - [`KubectlError::UnsupportedCredentialType`] if the secret kind has no converter
    pub fn resolve(&self, credentials_id: &str) -> Result<AuthResult> {
        let credential = self
            .store
            .lookup(credentials_id)
            .ok_or_else(|| KubectlError::CredentialNotFound(credentials_id.to_string()))?;
        self.registry.convert(&credential.secret)
    }

    /// Ids of the stored credentials that can be resolved, sorted.
    ///
    /// Meant for listing the selectable credentials in a UI.
    pub fn supported_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .store
            .list_ids()
            .into_iter()
            .filter(|id| {
                self.store
                    .lookup(id)
                    .is_some_and(|credential| self.registry.supports(credential.secret.kind()))
            })
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{self, MemoryCredentialStore};

    fn store() -> MemoryCredentialStore {
        MemoryCredentialStore::new()
            .with(Credential::new(
                "token",
                Secret::StringSecret {
                    secret: " t0k3n\n".to_string(),
                },
            ))
            .with(Credential::new(
                "basic",
                Secret::UsernamePassword {
                    username: "bob".to_string(),
                    password: "s3cr3t".to_string(),
                },
            ))
            .with(Credential::new(
                "cert",
                Secret::Certificate {
                    certificate: testkit::client_certificate_pem(),
                    key: testkit::client_key_pem(),
                },
            ))
            .with(Credential::new(
                "file",
                Secret::KubeconfigFile {
                    content: "apiVersion: v1\nkind: Config\n".to_string(),
                },
            ))
            .with(Credential::new(
                "ssh",
                Secret::Other {
                    kind: "ssh-private-key".to_string(),
                    fields: BTreeMap::new(),
                },
            ))
    }

    #[test]
    fn test_resolve_token() {
        let resolver = AuthResolver::new(store());
        assert_eq!(
            resolver.resolve("token").unwrap(),
            AuthResult::ClusterCredential(UserCredential::Token {
                token: "t0k3n".to_string()
            })
        );
    }

    #[test]
    fn test_resolve_basic_auth() {
        let resolver = AuthResolver::new(store());
        match resolver.resolve("basic").unwrap() {
            AuthResult::ClusterCredential(UserCredential::BasicAuth { username, password }) => {
                assert_eq!(username, "bob");
                assert_eq!(password, "s3cr3t");
            }
            other => panic!("Expected basic auth, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_certificate() {
        let resolver = AuthResolver::new(store());
        let auth = resolver.resolve("cert").unwrap();
        match auth {
            AuthResult::ClusterCredential(credential) => {
                assert_eq!(credential.scheme(), "client-certificate")
            }
            other => panic!("Expected client certificate, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_kubeconfig_file() {
        let resolver = AuthResolver::new(store());
        assert!(matches!(
            resolver.resolve("file").unwrap(),
            AuthResult::FullDocument { .. }
        ));
    }

    #[test]
    fn test_resolve_missing_credential() {
        let resolver = AuthResolver::new(store());
        match resolver.resolve("nope") {
            Err(KubectlError::CredentialNotFound(id)) => assert_eq!(id, "nope"),
            other => panic!("Expected CredentialNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_unsupported_kind() {
        let resolver = AuthResolver::new(store());
        match resolver.resolve("ssh") {
            Err(e @ KubectlError::UnsupportedCredentialType(_)) => {
                assert_eq!(e.to_string(), "Unsupported Credentials type ssh-private-key");
            }
            other => panic!("Expected UnsupportedCredentialType, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_token_is_invalid() {
        let store = MemoryCredentialStore::new().with(Credential::new(
            "empty",
            Secret::StringSecret {
                secret: "  ".to_string(),
            },
        ));
        let resolver = AuthResolver::new(store);
        assert!(matches!(
            resolver.resolve("empty"),
            Err(KubectlError::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_invalid_client_certificate() {
        let store = MemoryCredentialStore::new().with(Credential::new(
            "bad",
            Secret::Certificate {
                certificate: "garbage".to_string(),
                key: testkit::client_key_pem(),
            },
        ));
        let resolver = AuthResolver::new(store);
        assert!(matches!(
            resolver.resolve("bad"),
            Err(KubectlError::InvalidCertificate(_))
        ));
    }

    #[test]
    fn test_custom_converter() {
        fn ssh_as_token(secret: &Secret) -> Result<AuthResult> {
            match secret {
                Secret::Other { fields, .. } => {
                    Ok(AuthResult::ClusterCredential(UserCredential::Token {
                        token: fields.get("token").cloned().unwrap_or_default(),
                    }))
                }
                other => Err(unsupported(other)),
            }
        }

        let registry = ConverterRegistry::default().register("ssh-private-key", ssh_as_token);
        let resolver = AuthResolver::with_registry(store(), registry);

        assert!(resolver.resolve("ssh").is_ok());
        assert!(resolver.registry().supports("ssh-private-key"));
    }

    #[test]
    fn test_supported_ids() {
        let resolver = AuthResolver::new(store());
        assert_eq!(
            resolver.supported_ids(),
            vec!["basic", "cert", "file", "token"]
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credential = UserCredential::BasicAuth {
            username: "bob".to_string(),
            password: "s3cr3t".to_string(),
        };
        let debug = format!("{:?}", credential);
        assert!(debug.contains("bob"));
        assert!(!debug.contains("s3cr3t"));

        let secret = Secret::StringSecret {
            secret: "t0k3n".to_string(),
        };
        assert!(!format!("{:?}", secret).contains("t0k3n"));
    }
}
