use crate::bundle::{BundleKind, CredentialBundle};
use crate::provider::SecretProvider;
use pg2lake_core::{ExportError, Result};
use std::sync::Arc;
use tracing::debug;

/// Resolves credential bundles through a secret provider
#[derive(Clone)]
pub struct CredentialResolver {
    provider: Arc<dyn SecretProvider>,
}

impl CredentialResolver {
    pub fn new(provider: Arc<dyn SecretProvider>) -> Self {
        Self { provider }
    }

    /// Fetch `bundle_id` and check it holds every key `kind` requires.
    ///
    /// Defaults are filled for optional non-sensitive keys only. Repeated
    /// calls against an unchanged store return equal bundles.
    pub async fn resolve(&self, bundle_id: &str, kind: BundleKind) -> Result<CredentialBundle> {
        let mut values = self.provider.get_secret(bundle_id).await?;

        for key in kind.required_keys() {
            match values.get(*key) {
                None => {
                    return Err(ExportError::missing_credential(
                        bundle_id,
                        *key,
                        "key not present in secret",
                    ))
                }
                Some(value) if value.trim().is_empty() => {
                    return Err(ExportError::missing_credential(
                        bundle_id,
                        *key,
                        "value is empty",
                    ))
                }
                Some(_) => {}
            }
        }

        for (key, default) in kind.defaults() {
            let present = values.get(*key).is_some_and(|v| !v.trim().is_empty());
            if !present {
                values.insert(key.to_string(), default.to_string());
            }
        }

        debug!(
            bundle = %bundle_id,
            kind = %kind,
            keys = values.len(),
            "Resolved credential bundle"
        );
        Ok(CredentialBundle::new(bundle_id.to_string(), kind, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticSecretProvider;

    fn resolver() -> CredentialResolver {
        let provider = StaticSecretProvider::new()
            .with_secret(
                "AWSKEYS",
                [("AWS_ACCESS_KEY", "AKIA"), ("AWS_SECRET_KEY", "secret")],
            )
            .with_secret(
                "PARTIAL",
                [("AWS_ACCESS_KEY", "AKIA"), ("AWS_SECRET_KEY", "  ")],
            )
            .with_secret(
                "POSTGRESQL",
                [
                    ("POSTGRES_HOST", "db.internal"),
                    ("POSTGRES_USER", "etl"),
                    ("POSTGRES_PASSWORD", "pw"),
                    ("POSTGRES_DB", "app"),
                ],
            );
        CredentialResolver::new(Arc::new(provider))
    }

    #[tokio::test]
    async fn fills_region_default() {
        let bundle = resolver()
            .resolve("AWSKEYS", BundleKind::ObjectStore)
            .await
            .unwrap();
        assert_eq!(bundle.get("AWS_REGION"), Some("us-east-1"));
        assert_eq!(bundle.id(), "AWSKEYS");
    }

    #[tokio::test]
    async fn missing_required_key_names_bundle_and_key() {
        let err = resolver()
            .resolve("POSTGRESQL", BundleKind::Postgres)
            .await
            .unwrap_err();
        match err {
            ExportError::MissingCredential { bundle, key, .. } => {
                assert_eq!(bundle, "POSTGRESQL");
                assert_eq!(key, "POSTGRES_PORT");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn blank_value_counts_as_missing() {
        let err = resolver()
            .resolve("PARTIAL", BundleKind::ObjectStore)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::MissingCredential { .. }));
    }

    #[tokio::test]
    async fn unknown_bundle_is_lookup_error() {
        let err = resolver()
            .resolve("NOPE", BundleKind::ObjectStore)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::SecretLookup { .. }));
    }

    #[tokio::test]
    async fn resolution_is_idempotent() {
        let r = resolver();
        let first = r.resolve("AWSKEYS", BundleKind::ObjectStore).await.unwrap();
        let second = r.resolve("AWSKEYS", BundleKind::ObjectStore).await.unwrap();
        assert_eq!(first.get("AWS_ACCESS_KEY"), second.get("AWS_ACCESS_KEY"));
        assert_eq!(first.get("AWS_REGION"), second.get("AWS_REGION"));
    }
}
