// pg2lake-secrets - Credential bundle resolution
//
// Fetches named secrets through a `SecretProvider`, checks that every key the
// bundle kind requires is present, and fills non-sensitive defaults.

mod bundle;
mod provider;
mod resolver;

pub use bundle::{
    BundleKind, CredentialBundle, ObjectStoreCredentials, AWS_ACCESS_KEY, AWS_REGION,
    AWS_SECRET_KEY,
};
pub use provider::{
    parse_secret_payload, AwsSecretsManagerProvider, EnvSecretProvider, SecretProvider,
    StaticSecretProvider, SECRET_ENV_PREFIX,
};
pub use resolver::CredentialResolver;

/// Region used for the secret store and object storage when none is given
pub const DEFAULT_REGION: &str = "us-east-1";
