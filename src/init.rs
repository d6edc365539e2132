// Process-level initialization: tracing and the secret provider

use pg2lake_config::{CredentialsConfig, LogFormat, LoggingConfig, SecretProviderKind};
use pg2lake_secrets::{AwsSecretsManagerProvider, EnvSecretProvider, SecretProvider};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

/// Install the global subscriber. Later calls are no-ops.
pub fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    let _ = match logging.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().json().with_target(false)),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(tracing_subscriber::fmt::layer().with_target(false)),
        ),
    };
}

/// Secret provider selected by `[credentials].provider`
pub async fn secret_provider(credentials: &CredentialsConfig) -> Arc<dyn SecretProvider> {
    match credentials.provider {
        SecretProviderKind::Aws => {
            info!(region = %credentials.region, "Using AWS Secrets Manager");
            Arc::new(AwsSecretsManagerProvider::new(credentials.region.clone()).await)
        }
        SecretProviderKind::Env => {
            info!("Using environment secret provider");
            Arc::new(EnvSecretProvider::new())
        }
    }
}
