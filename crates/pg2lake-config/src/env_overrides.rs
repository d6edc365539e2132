use super::{LogFormat, RuntimeConfig, SecretProviderKind};
use anyhow::{anyhow, Context, Result};
use pg2lake_core::{NullTimestampPolicy, OutputFormat};

pub const ENV_PREFIX: &str = "PG2LAKE_";

/// Abstraction over environment-variable lookups so tests and embedders can
/// supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the PG2LAKE_ prefix
    /// Used for AWS standard variables (AWS_ENDPOINT_URL, etc.)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Export configuration
    if let Some(table) = get_env_string(env, "SOURCE_TABLE")? {
        config.export.source_table = non_empty(table);
    }
    if let Some(query) = get_env_string(env, "QUERY")? {
        config.export.query = non_empty(query);
    }
    if let Some(field) = get_env_string(env, "TIMESTAMP_FIELD")? {
        config.export.timestamp_field = field;
    }
    if let Some(field) = get_env_string(env, "LIST_FIELD")? {
        config.export.list_field = non_empty(field);
    }
    if let Some(separator) = get_env_string(env, "LIST_SEPARATOR")? {
        config.export.list_separator = separator;
    }
    if let Some(prefix) = get_env_string(env, "OUTPUT_PREFIX")? {
        config.export.output_prefix = prefix;
    }
    if let Some(val) = get_env_bool(env, "OVERWRITE")? {
        config.export.overwrite = val;
    }
    if let Some(policy) = get_env_string(env, "ON_NULL_TIMESTAMP")? {
        config.export.on_null_timestamp = policy
            .parse::<NullTimestampPolicy>()
            .map_err(|e| anyhow!(e))
            .context("Invalid PG2LAKE_ON_NULL_TIMESTAMP value")?;
    }
    if let Some(format) = get_env_string(env, "FORMAT")? {
        config.export.format = format
            .parse::<OutputFormat>()
            .map_err(|e| anyhow!(e))
            .context("Invalid PG2LAKE_FORMAT value")?;
    }
    if let Some(val) = get_env_bool(env, "HEADER")? {
        config.export.header = val;
    }
    if let Some(val) = get_env_u64(env, "WRITE_TIMEOUT_SECS")? {
        config.export.write_timeout_secs = val;
    }
    if let Some(val) = get_env_usize(env, "WRITE_CONCURRENCY")? {
        config.export.write_concurrency = val;
    }
    if let Some(val) = get_env_bool(env, "SUCCESS_MARKER")? {
        config.export.success_marker = val;
    }

    // Credentials
    if let Some(provider) = get_env_string(env, "SECRET_PROVIDER")? {
        config.credentials.provider = provider
            .parse::<SecretProviderKind>()
            .context("Invalid PG2LAKE_SECRET_PROVIDER value")?;
    }
    if let Some(region) = get_env_string(env, "SECRET_REGION")? {
        config.credentials.region = region;
    }
    if let Some(bundle) = get_env_string(env, "SOURCE_BUNDLE")? {
        config.credentials.source_bundle = bundle;
    }
    if let Some(bundle) = get_env_string(env, "SINK_BUNDLE")? {
        config.credentials.sink_bundle = non_empty(bundle);
    }

    // Source session
    if let Some(val) = get_env_u64(env, "CONNECT_TIMEOUT_SECS")? {
        config.source.connect_timeout_secs = val;
    }
    if let Some(name) = get_env_string(env, "APPLICATION_NAME")? {
        config.source.application_name = name;
    }

    // Storage: prefixed override wins over the AWS standard variable
    if let Some(endpoint) = get_env_string(env, "S3_ENDPOINT")? {
        config.storage.s3_endpoint = non_empty(endpoint);
    } else if let Some(endpoint) = get_raw_env_string(env, "AWS_ENDPOINT_URL")? {
        config.storage.s3_endpoint = non_empty(endpoint);
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL")? {
        config.logging.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT")? {
        config.logging.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get(key))
}

/// Get a raw environment variable without the PG2LAKE_ prefix
fn get_raw_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get_raw(key))
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val.parse::<bool>().map_err(|e| {
                anyhow!(
                    "Failed to parse {}{} (expected bool): {}",
                    ENV_PREFIX,
                    key,
                    e
                )
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
