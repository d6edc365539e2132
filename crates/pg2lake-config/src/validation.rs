// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_export_config(&config.export)?;
    validate_credentials_config(&config.credentials)?;
    validate_source_config(&config.source)?;

    if config.logging.level.trim().is_empty() {
        bail!("logging.level must not be empty");
    }

    Ok(())
}

fn validate_export_config(config: &ExportConfig) -> Result<()> {
    match (&config.source_table, &config.query) {
        (None, None) => bail!(
            "A source table or query is required\n\n\
            How to fix:\n\
              • Environment: export {}SOURCE_TABLE=public.mockrecord\n\
              • TOML: [export]\n              source_table = \"public.mockrecord\"\n\
              • CLI: pg2lake run --table public.mockrecord\n",
            ENV_PREFIX
        ),
        (Some(_), Some(_)) => bail!(
            "export.source_table and export.query are mutually exclusive\n\n\
            How to fix:\n\
              • Remove one of them from the [export] section\n\
              • Or unset {}SOURCE_TABLE / {}QUERY\n",
            ENV_PREFIX,
            ENV_PREFIX
        ),
        _ => {}
    }

    if config.output_prefix.trim().is_empty() {
        bail!(
            "Output prefix is required\n\n\
            How to fix:\n\
              • Environment: export {}OUTPUT_PREFIX=s3a://my-bucket/exports\n\
              • TOML: [export]\n              output_prefix = \"s3a://my-bucket/exports\"\n\
              • CLI: pg2lake run --output s3a://my-bucket/exports\n",
            ENV_PREFIX
        );
    }
    config.output_location()?;

    if config.timestamp_field.trim().is_empty() {
        bail!(
            "Timestamp column is required to derive partitions\n\n\
            How to fix:\n\
              • Environment: export {}TIMESTAMP_FIELD=start_date_time\n\
              • TOML: [export]\n              timestamp_field = \"start_date_time\"\n",
            ENV_PREFIX
        );
    }

    if config.write_concurrency == 0 {
        bail!("export.write_concurrency must be greater than 0");
    }

    if config.write_timeout_secs == 0 {
        bail!("export.write_timeout_secs must be greater than 0");
    }

    if config.write_concurrency > 64 {
        warn!(
            write_concurrency = config.write_concurrency,
            "export.write_concurrency is very large; may exhaust storage connections"
        );
    }

    Ok(())
}

fn validate_credentials_config(config: &CredentialsConfig) -> Result<()> {
    if config.source_bundle.trim().is_empty() {
        bail!(
            "Source credential bundle id is required\n\n\
            How to fix:\n\
              • Environment: export {}SOURCE_BUNDLE=POSTGRESQL\n\
              • TOML: [credentials]\n              source_bundle = \"POSTGRESQL\"\n",
            ENV_PREFIX
        );
    }

    if config.provider == SecretProviderKind::Aws && config.region.trim().is_empty() {
        bail!(
            "Secret store region is required for the aws provider\n\n\
            How to fix:\n\
              • Environment: export {}SECRET_REGION=us-east-1\n\
              • TOML: [credentials]\n              region = \"us-east-1\"\n",
            ENV_PREFIX
        );
    }

    Ok(())
}

fn validate_source_config(config: &SourceConfig) -> Result<()> {
    if config.connect_timeout_secs == 0 {
        bail!("source.connect_timeout_secs must be greater than 0");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.export.source_table = Some("public.mockrecord".to_string());
        config.export.output_prefix = "s3a://lake/mockrecord".to_string();
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_requires_exactly_one_of_table_or_query() {
        let mut config = valid();
        config.export.source_table = None;
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("How to fix"));
        assert!(err.contains("PG2LAKE_SOURCE_TABLE"));

        let mut config = valid();
        config.export.query = Some("select * from t".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_output_prefix_checked() {
        let mut config = valid();
        config.export.output_prefix = String::new();
        assert!(validate_config(&config)
            .unwrap_err()
            .to_string()
            .contains("PG2LAKE_OUTPUT_PREFIX"));

        config.export.output_prefix = "ftp://host/path".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = valid();
        config.export.write_concurrency = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.export.write_timeout_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.source.connect_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_env_provider_does_not_need_region() {
        let mut config = valid();
        config.credentials.provider = SecretProviderKind::Env;
        config.credentials.region = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
