// pg2lake-config - Runtime configuration for export runs
//
// Supports configuration from multiple sources:
// 1. Command line flags (applied by the binary, highest priority)
// 2. Environment variables (PG2LAKE_* prefix)
// 3. Config file path from PG2LAKE_CONFIG env var (or --config)
// 4. Config file contents from PG2LAKE_CONFIG_CONTENT env var
// 5. Default config file locations (./pg2lake.toml, ./.pg2lake.toml)
// 6. Built-in defaults (lowest priority)

use anyhow::Result;
use pg2lake_core::{NullTimestampPolicy, OutputFormat, TransformOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod env_overrides;
mod location;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};
pub use location::OutputLocation;

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What to extract and where to write it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Table to export, optionally schema-qualified (`public.mockrecord`)
    pub source_table: Option<String>,
    /// Raw SQL to export instead of a table
    pub query: Option<String>,
    pub timestamp_field: String,
    pub list_field: Option<String>,
    pub list_separator: String,
    /// Output URI: `s3://`, `s3a://`, `file://`, bare path or `memory://`
    pub output_prefix: String,
    pub overwrite: bool,
    pub on_null_timestamp: NullTimestampPolicy,
    pub format: OutputFormat,
    pub header: bool,
    pub write_timeout_secs: u64,
    pub write_concurrency: usize,
    pub success_marker: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            source_table: None,
            query: None,
            timestamp_field: "start_date_time".to_string(),
            list_field: None,
            list_separator: ",".to_string(),
            output_prefix: String::new(),
            overwrite: true,
            on_null_timestamp: NullTimestampPolicy::Abort,
            format: OutputFormat::Csv,
            header: true,
            write_timeout_secs: 300,
            write_concurrency: 8,
            success_marker: true,
        }
    }
}

impl ExportConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn transform_options(&self) -> TransformOptions {
        let options = TransformOptions::new(self.timestamp_field.clone())
            .with_null_policy(self.on_null_timestamp);
        match &self.list_field {
            Some(field) => options.with_list_field(field.clone(), self.list_separator.clone()),
            None => options,
        }
    }

    pub fn output_location(&self) -> Result<OutputLocation> {
        OutputLocation::parse(&self.output_prefix)
    }
}

/// Where credential bundles come from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub provider: SecretProviderKind,
    /// Region of the secret store
    pub region: String,
    /// Bundle holding the PostgreSQL connection keys
    pub source_bundle: String,
    /// Bundle holding object storage keys; ambient AWS credentials when unset
    pub sink_bundle: Option<String>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            provider: SecretProviderKind::Aws,
            region: "us-east-1".to_string(),
            source_bundle: "POSTGRESQL".to_string(),
            sink_bundle: Some("AWSKEYS".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretProviderKind {
    Aws,
    Env,
}

impl std::fmt::Display for SecretProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretProviderKind::Aws => write!(f, "aws"),
            SecretProviderKind::Env => write!(f, "env"),
        }
    }
}

impl std::str::FromStr for SecretProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "aws" | "secretsmanager" => Ok(SecretProviderKind::Aws),
            "env" | "environment" => Ok(SecretProviderKind::Env),
            _ => anyhow::bail!("Unsupported secret provider: {}. Supported: aws, env", s),
        }
    }
}

/// Source database session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub connect_timeout_secs: u64,
    pub application_name: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            application_name: "pg2lake".to_string(),
        }
    }
}

impl SourceConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Object storage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// S3 endpoint override; `https://s3.<region>.amazonaws.com` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority and validate it
    pub fn load() -> Result<Self> {
        let config = Self::load_layers(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults, the config file and environment overrides without
    /// validating, so callers can apply command line flags first.
    ///
    /// An explicit `config_path` takes precedence over `PG2LAKE_CONFIG` and
    /// the default file locations; it is an error if it cannot be read.
    pub fn load_layers(config_path: Option<&Path>) -> Result<Self> {
        sources::load_config(config_path, &sources::StdEnvSource)
    }

    /// Layer inline TOML content and overrides from a custom `EnvSource`
    /// over the defaults, then validate.
    pub fn load_with_env<E: EnvSource>(inline_config: Option<&str>, env: &E) -> Result<Self> {
        let mut config = RuntimeConfig::default();
        if let Some(inline) = inline_config {
            config.merge(sources::parse_toml(inline, "inline config content")?);
        }
        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.export = other.export;
        self.credentials = other.credentials;
        self.source = other.source;
        self.storage = other.storage;
        self.logging = other.logging;
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_provider_from_str() {
        assert_eq!(
            "aws".parse::<SecretProviderKind>().unwrap(),
            SecretProviderKind::Aws
        );
        assert_eq!(
            "ENV".parse::<SecretProviderKind>().unwrap(),
            SecretProviderKind::Env
        );
        assert!("vault".parse::<SecretProviderKind>().is_err());
    }

    #[test]
    fn test_default_configs() {
        let config = RuntimeConfig::default();
        assert_eq!(config.export.timestamp_field, "start_date_time");
        assert_eq!(config.export.list_separator, ",");
        assert!(config.export.overwrite);
        assert!(config.export.header);
        assert_eq!(config.export.on_null_timestamp, NullTimestampPolicy::Abort);
        assert_eq!(config.credentials.region, "us-east-1");
        assert_eq!(config.credentials.source_bundle, "POSTGRESQL");
        assert_eq!(config.credentials.sink_bundle.as_deref(), Some("AWSKEYS"));
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = r#"
            [export]
            source_table = "public.mockrecord"
            list_field = "questions_list"
            output_prefix = "s3a://lake/mockrecord"
            format = "parquet"
        "#;
        let config: RuntimeConfig = toml::from_str(toml).unwrap();

        assert_eq!(config.export.source_table.as_deref(), Some("public.mockrecord"));
        assert_eq!(config.export.format, OutputFormat::Parquet);
        assert_eq!(config.export.write_concurrency, 8);
        assert_eq!(config.source.application_name, "pg2lake");
    }

    #[test]
    fn test_example_config_is_valid() {
        let config =
            sources::parse_toml(include_str!("../../../pg2lake.example.toml"), "example").unwrap();
        config.validate().unwrap();

        assert_eq!(
            config.export.output_location().unwrap(),
            OutputLocation::S3 {
                bucket: "lake".to_string(),
                prefix: "exports/mockrecord".to_string(),
            }
        );
        assert_eq!(config.export.list_field.as_deref(), Some("questions_list"));
    }

    #[test]
    fn test_transform_options_follow_export_config() {
        let export = ExportConfig {
            list_field: Some("questions_list".to_string()),
            list_separator: "|".to_string(),
            on_null_timestamp: NullTimestampPolicy::Skip,
            ..ExportConfig::default()
        };
        let options = export.transform_options();

        assert_eq!(options.timestamp_field, "start_date_time");
        assert_eq!(options.list_field.as_deref(), Some("questions_list"));
        assert_eq!(options.list_separator, "|");
        assert_eq!(options.on_null_timestamp, NullTimestampPolicy::Skip);
    }
}
