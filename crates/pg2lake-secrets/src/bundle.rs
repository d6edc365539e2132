//! Credential bundle kinds and resolved bundles.

use crate::DEFAULT_REGION;
use pg2lake_core::{ExportError, Result};
use std::collections::HashMap;
use std::fmt;

pub const AWS_ACCESS_KEY: &str = "AWS_ACCESS_KEY";
pub const AWS_SECRET_KEY: &str = "AWS_SECRET_KEY";
pub const AWS_REGION: &str = "AWS_REGION";

/// Which system a bundle grants access to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleKind {
    /// Object storage keys (`AWS_ACCESS_KEY`, `AWS_SECRET_KEY`, `AWS_REGION`)
    ObjectStore,
    /// PostgreSQL connection keys
    Postgres,
}

impl BundleKind {
    pub fn required_keys(&self) -> &'static [&'static str] {
        match self {
            BundleKind::ObjectStore => &[AWS_ACCESS_KEY, AWS_SECRET_KEY],
            BundleKind::Postgres => &[
                "POSTGRES_HOST",
                "POSTGRES_USER",
                "POSTGRES_PASSWORD",
                "POSTGRES_DB",
                "POSTGRES_PORT",
            ],
        }
    }

    /// Defaults for optional, non-sensitive keys
    pub fn defaults(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            BundleKind::ObjectStore => &[(AWS_REGION, DEFAULT_REGION)],
            BundleKind::Postgres => &[],
        }
    }
}

impl fmt::Display for BundleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleKind::ObjectStore => write!(f, "object-store"),
            BundleKind::Postgres => write!(f, "postgres"),
        }
    }
}

/// A complete, validated set of secret values for one system
#[derive(Clone)]
pub struct CredentialBundle {
    id: String,
    kind: BundleKind,
    values: HashMap<String, String>,
}

impl CredentialBundle {
    pub(crate) fn new(id: String, kind: BundleKind, values: HashMap<String, String>) -> Self {
        Self { id, kind, values }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> BundleKind {
        self.kind
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value of `key`, or `MissingCredential` naming this bundle
    pub fn require(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            Some(_) => Err(ExportError::missing_credential(
                self.id.as_str(),
                key,
                "value is empty",
            )),
            None => Err(ExportError::missing_credential(
                self.id.as_str(),
                key,
                "key not present in secret",
            )),
        }
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("CredentialBundle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("keys", &keys)
            .finish_non_exhaustive()
    }
}

/// Typed view over an object storage bundle
#[derive(Clone)]
pub struct ObjectStoreCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl ObjectStoreCredentials {
    pub fn from_bundle(bundle: &CredentialBundle) -> Result<Self> {
        let region = bundle
            .get(AWS_REGION)
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(DEFAULT_REGION);
        Ok(Self {
            access_key_id: bundle.require(AWS_ACCESS_KEY)?.to_string(),
            secret_access_key: bundle.require(AWS_SECRET_KEY)?.to_string(),
            region: region.to_string(),
        })
    }
}

impl fmt::Debug for ObjectStoreCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreCredentials")
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}
