// Export session - the source and sink handles of one run
//
// Opened at the start of a run and released when dropped, on success and on
// every error path. Dropping a PostgreSQL-backed session aborts its
// connection task.

use opendal::Operator;
use pg2lake_config::{OutputLocation, RuntimeConfig};
use pg2lake_core::{ExportError, Result};
use pg2lake_secrets::{BundleKind, CredentialResolver, ObjectStoreCredentials};
use pg2lake_source::{ConnectionSpec, PostgresOptions, PostgresSource, RecordSource};
use pg2lake_writer::initialize_storage;
use tracing::{debug, info};

pub struct ExportSession {
    source: Box<dyn RecordSource>,
    operator: Operator,
    base_path: String,
}

impl ExportSession {
    /// Assemble a session from already opened handles.
    pub fn new(
        source: Box<dyn RecordSource>,
        operator: Operator,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            source,
            operator,
            base_path: base_path.into(),
        }
    }

    /// Resolve both credential bundles, connect to PostgreSQL, then build
    /// the storage operator.
    ///
    /// The operator is created last so a failed connection never creates
    /// the output location.
    pub async fn open(config: &RuntimeConfig, resolver: &CredentialResolver) -> Result<Self> {
        let location = config
            .export
            .output_location()
            .map_err(|e| ExportError::invalid_config(e.to_string()))?;

        let source_bundle = resolver
            .resolve(&config.credentials.source_bundle, BundleKind::Postgres)
            .await?;
        let spec = ConnectionSpec::from_bundle(&source_bundle)?;

        let sink_credentials = match (&location, &config.credentials.sink_bundle) {
            (OutputLocation::S3 { .. }, Some(bundle_id)) => {
                let bundle = resolver.resolve(bundle_id, BundleKind::ObjectStore).await?;
                Some(ObjectStoreCredentials::from_bundle(&bundle)?)
            }
            (OutputLocation::S3 { .. }, None) => {
                debug!("No sink bundle configured, using the ambient AWS credential chain");
                None
            }
            _ => None,
        };

        let options = PostgresOptions {
            connect_timeout: config.source.connect_timeout(),
            application_name: config.source.application_name.clone(),
        };
        let source = PostgresSource::connect(&spec, &options).await?;

        let operator = initialize_storage(
            &location,
            &config.storage,
            sink_credentials.as_ref(),
            &config.credentials.region,
        )?;

        info!(source = %spec, output = %location, "Export session opened");
        Ok(Self::new(
            Box::new(source),
            operator,
            location.base_path().to_string(),
        ))
    }

    pub fn source(&self) -> &dyn RecordSource {
        self.source.as_ref()
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Export root relative to the operator root
    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

impl Drop for ExportSession {
    fn drop(&mut self) {
        debug!(base_path = %self.base_path, "Export session released");
    }
}
