//! Secret references and resolution
//!
//! A [`SecretRef`] is a late-bound handle to sensitive bytes. Plans carry only
//! the reference; the clear value is materialized by a [`SecretStore`] at
//! execution time and never written to logs, plan digests, or captured
//! outputs.

#![allow(clippy::must_use_candidate)]

use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while resolving secrets
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretError {
    /// The store has no value for the reference
    #[error("Secret '{id}' is not known to the store")]
    Unknown {
        /// Identifier of the missing secret.
        id: String,
    },

    /// The backing environment variable is not set
    #[error("Environment variable '{var}' for secret '{id}' is not set")]
    EnvMissing {
        /// Identifier of the secret.
        id: String,
        /// Name of the unset variable.
        var: String,
    },

    /// The backing store refused or failed the request
    #[error("Secret store failure for '{id}': {reason}")]
    StoreFailure {
        /// Identifier of the secret.
        id: String,
        /// Failure description from the store.
        reason: String,
    },
}

/// Where a secret's bytes come from at resolution time
///
/// The origin never leaves the process: serialization of a [`SecretRef`]
/// emits the identifier only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SecretOrigin {
    /// Resolved by the store from its own backing state
    Store,
    /// Resolved from a process environment variable
    Env(String),
    /// Rendered docker-style auth config over other secrets
    DockerConfig(Vec<crate::step::registry::RegistryCredential>),
}

/// Opaque, late-bound reference to sensitive bytes
///
/// Serialization emits the identifier only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretRef {
    id: String,
    origin: SecretOrigin,
}

impl SecretRef {
    /// Creates a reference resolved by the store under the given identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            origin: SecretOrigin::Store,
        }
    }

    /// Creates a reference with a random identifier, resolved by the store
    pub fn anonymous() -> Self {
        Self::new(format!("secret-{}", Uuid::new_v4()))
    }

    /// Creates a reference backed by a process environment variable
    pub fn from_env(id: impl Into<String>, var: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            origin: SecretOrigin::Env(var.into()),
        }
    }

    /// Creates a reference that resolves to a rendered auth-config document
    ///
    /// The clear passwords are looked up through the store at resolution
    /// time; the reference itself carries only other references.
    pub fn docker_config(
        id: impl Into<String>,
        credentials: Vec<crate::step::registry::RegistryCredential>,
    ) -> Self {
        Self {
            id: id.into(),
            origin: SecretOrigin::DockerConfig(credentials),
        }
    }

    /// Returns the opaque identifier
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "secret:{}", self.id)
    }
}

impl Serialize for SecretRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("secret:{}", self.id))
    }
}

/// Resolved secret bytes
///
/// `Debug` and `Display` redact the value. There is no serialization; the
/// only way out is [`SecretValue::reveal`], called by the executor inside an
/// execution the user requested.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(Vec<u8>);

impl SecretValue {
    /// Wraps resolved bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Exposes the clear bytes
    ///
    /// Callers must not write the result to logs or captured artifacts.
    pub fn reveal(&self) -> &[u8] {
        &self.0
    }

    /// Exposes the clear value as a lossy string
    pub fn reveal_str(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue(<redacted>)")
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<redacted>")
    }
}

/// Resolves secret references to their clear values at execution time
pub trait SecretStore: Send + Sync {
    /// Resolves a store-backed identifier to its clear value
    ///
    /// # Errors
    ///
    /// Returns [`SecretError`] when the identifier is unknown or the backing
    /// source is unavailable.
    fn resolve_id(&self, id: &str) -> Result<SecretValue, SecretError>;

    /// Resolves any reference, regardless of its origin
    ///
    /// Environment-backed references read their declared variable; derived
    /// auth-config references render the document over their constituent
    /// password references.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError`] when the reference or any of its constituents
    /// cannot be resolved.
    fn resolve(&self, secret: &SecretRef) -> Result<SecretValue, SecretError> {
        match &secret.origin {
            SecretOrigin::Store => self.resolve_id(&secret.id),
            SecretOrigin::Env(var) => resolve_from_env(secret, var),
            SecretOrigin::DockerConfig(credentials) => {
                let mut entries = Vec::with_capacity(credentials.len());
                for credential in credentials {
                    let password = self.resolve(credential.password())?;
                    entries.push((
                        credential.host().to_string(),
                        credential.username().to_string(),
                        password.reveal_str(),
                    ));
                }
                Ok(SecretValue::new(
                    crate::step::registry::render_docker_config(&entries),
                ))
            }
        }
    }
}

/// In-memory store seeded by the caller
///
/// Typically used by tests and by callers that already hold the sensitive
/// bytes (e.g. read from a runtime-provided mount).
#[derive(Default, Clone)]
pub struct StaticSecretStore {
    values: Arc<parking_lot::RwLock<HashMap<String, SecretValue>>>,
}

impl StaticSecretStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a value and returns the reference that resolves to it
    pub fn insert(&self, id: impl Into<String>, value: impl Into<Vec<u8>>) -> SecretRef {
        let id = id.into();
        self.values
            .write()
            .insert(id.clone(), SecretValue::new(value));
        SecretRef::new(id)
    }
}

impl fmt::Debug for StaticSecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StaticSecretStore({} entries)", self.values.read().len())
    }
}

impl SecretStore for StaticSecretStore {
    fn resolve_id(&self, id: &str) -> Result<SecretValue, SecretError> {
        self.values
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| SecretError::Unknown { id: id.to_string() })
    }
}

/// Store that resolves every reference from the process environment
///
/// References created with [`SecretRef::from_env`] use their declared
/// variable; plain references use their identifier as the variable name.
#[derive(Debug, Default, Clone)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    /// Creates the store
    pub fn new() -> Self {
        Self
    }
}

impl SecretStore for EnvSecretStore {
    fn resolve_id(&self, id: &str) -> Result<SecretValue, SecretError> {
        resolve_from_env(&SecretRef::new(id), id)
    }
}

fn resolve_from_env(secret: &SecretRef, var: &str) -> Result<SecretValue, SecretError> {
    std::env::var(var)
        .map(SecretValue::new)
        .map_err(|_| SecretError::EnvMissing {
            id: secret.id().to_string(),
            var: var.to_string(),
        })
}
