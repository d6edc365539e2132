// Secret providers
//
// Implementations:
// - AwsSecretsManagerProvider (GetSecretValue, JSON SecretString)
// - EnvSecretProvider (PG2LAKE_SECRET_<ID>, local development)
// - StaticSecretProvider (in-memory, embedding and tests)

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use pg2lake_core::{ExportError, Result};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::debug;

pub const SECRET_ENV_PREFIX: &str = "PG2LAKE_SECRET_";

/// Source of named secrets, each a flat map of string keys to string values
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Fetch the secret `id`.
    ///
    /// Fails with `SecretLookup` when the store is unreachable, the secret
    /// does not exist, or its payload is not a JSON object.
    async fn get_secret(&self, id: &str) -> Result<HashMap<String, String>>;
}

/// Parse a JSON object secret payload into string values.
///
/// Non-string scalars are stringified, nested values are kept as JSON text
/// and `null` members are treated as absent.
pub fn parse_secret_payload(id: &str, payload: &str) -> Result<HashMap<String, String>> {
    let parsed: JsonValue = serde_json::from_str(payload)
        .map_err(|e| ExportError::secret_lookup(id, format!("payload is not valid JSON: {}", e)))?;

    let JsonValue::Object(members) = parsed else {
        return Err(ExportError::secret_lookup(
            id,
            "payload is not a JSON object",
        ));
    };

    Ok(members
        .into_iter()
        .filter_map(|(key, value)| {
            let text = match value {
                JsonValue::Null => return None,
                JsonValue::String(s) => s,
                JsonValue::Bool(b) => b.to_string(),
                JsonValue::Number(n) => n.to_string(),
                nested => nested.to_string(),
            };
            Some((key, text))
        })
        .collect())
}

/// AWS Secrets Manager backed provider
pub struct AwsSecretsManagerProvider {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecretsManagerProvider {
    /// Build a client for `region` using the ambient AWS credential chain.
    pub async fn new(region: impl Into<String>) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .load()
            .await;
        Self {
            client: aws_sdk_secretsmanager::Client::new(&sdk_config),
        }
    }

    pub fn from_client(client: aws_sdk_secretsmanager::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretProvider for AwsSecretsManagerProvider {
    async fn get_secret(&self, id: &str) -> Result<HashMap<String, String>> {
        debug!(secret_id = %id, "Fetching secret from AWS Secrets Manager");
        let output = self
            .client
            .get_secret_value()
            .secret_id(id)
            .send()
            .await
            .map_err(|e| ExportError::secret_lookup(id, DisplayErrorContext(&e).to_string()))?;

        let payload = output
            .secret_string()
            .ok_or_else(|| ExportError::secret_lookup(id, "secret has no string value"))?;
        parse_secret_payload(id, payload)
    }
}

/// Reads secrets from `PG2LAKE_SECRET_<ID>` environment variables holding a
/// JSON object. The id is upper-cased and non-alphanumerics become `_`.
#[derive(Debug, Default, Clone)]
pub struct EnvSecretProvider;

impl EnvSecretProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn variable_name(id: &str) -> String {
        let suffix: String = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{}", SECRET_ENV_PREFIX, suffix)
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn get_secret(&self, id: &str) -> Result<HashMap<String, String>> {
        let name = Self::variable_name(id);
        let payload = std::env::var(&name).map_err(|_| {
            ExportError::secret_lookup(id, format!("environment variable {} is not set", name))
        })?;
        parse_secret_payload(id, &payload)
    }
}

/// In-memory provider
#[derive(Debug, Default, Clone)]
pub struct StaticSecretProvider {
    secrets: HashMap<String, HashMap<String, String>>,
}

impl StaticSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret<K, V>(mut self, id: impl Into<String>, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.secrets.insert(
            id.into(),
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn get_secret(&self, id: &str) -> Result<HashMap<String, String>> {
        self.secrets
            .get(id)
            .cloned()
            .ok_or_else(|| ExportError::secret_lookup(id, "secret not found"))
    }
}
