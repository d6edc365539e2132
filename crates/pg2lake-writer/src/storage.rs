//! Storage operator initialization
//!
//! Builds an OpenDAL operator for the configured output location. Unlike a
//! process-wide operator, each export session owns its own.

use opendal::Operator;
use pg2lake_config::{OutputLocation, StorageConfig};
use pg2lake_core::{ExportError, Result};
use pg2lake_secrets::ObjectStoreCredentials;
use tracing::debug;

/// Endpoint used for S3 when no override is configured
pub fn default_s3_endpoint(region: &str) -> String {
    format!("https://s3.{}.amazonaws.com", region)
}

/// Create an operator rooted so that [`OutputLocation::base_path`] is the
/// export root.
///
/// S3 uses path-style addressing. Without `credentials` the ambient AWS
/// credential chain applies and `fallback_region` selects the endpoint.
pub fn initialize_storage(
    location: &OutputLocation,
    storage: &StorageConfig,
    credentials: Option<&ObjectStoreCredentials>,
    fallback_region: &str,
) -> Result<Operator> {
    let operator = match location {
        OutputLocation::Fs { root } => {
            let fs_builder = opendal::services::Fs::default().root(root);
            Operator::new(fs_builder)
                .map_err(|e| {
                    ExportError::write(None, format!("Failed to create filesystem operator: {}", e))
                })?
                .finish()
        }
        OutputLocation::S3 { bucket, .. } => {
            let region = credentials
                .map(|c| c.region.as_str())
                .unwrap_or(fallback_region);
            let endpoint = storage
                .s3_endpoint
                .clone()
                .unwrap_or_else(|| default_s3_endpoint(region));

            let mut s3_builder = opendal::services::S3::default()
                .bucket(bucket)
                .region(region)
                .endpoint(&endpoint);

            if let Some(creds) = credentials {
                s3_builder = s3_builder
                    .access_key_id(&creds.access_key_id)
                    .secret_access_key(&creds.secret_access_key);
            }

            debug!(bucket = %bucket, region = %region, endpoint = %endpoint, "Creating S3 operator");
            Operator::new(s3_builder)
                .map_err(|e| ExportError::write(None, format!("Failed to create S3 operator: {}", e)))?
                .finish()
        }
        OutputLocation::Memory { .. } => Operator::new(opendal::services::Memory::default())
            .map_err(|e| {
                ExportError::write(None, format!("Failed to create memory operator: {}", e))
            })?
            .finish(),
    };

    debug!(location = %location, "Storage operator initialized");
    Ok(operator)
}
