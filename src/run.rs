//! One export run: extract, transform, then write partitioned output.
//!
//! Every record is extracted and transformed before the writer starts, so
//! an extraction or transform failure never reaches storage.

use crate::session::ExportSession;
use futures::TryStreamExt;
use pg2lake_config::{ExportConfig, RuntimeConfig};
use pg2lake_core::{
    default_partition_fields, transform_record, ExportError, Result, TransformOptions,
};
use pg2lake_secrets::CredentialResolver;
use pg2lake_source::SourceQuery;
use pg2lake_writer::{PartitionedWriter, WriteOptions, WriteReport};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub extracted: usize,
    pub skipped_null_timestamps: usize,
    pub write: WriteReport,
}

/// Everything a run needs besides its session
#[derive(Debug, Clone)]
pub struct ExportRun {
    query: SourceQuery,
    transform: TransformOptions,
    write: WriteOptions,
}

impl ExportRun {
    pub fn new(query: SourceQuery, transform: TransformOptions, write: WriteOptions) -> Self {
        Self {
            query,
            transform,
            write,
        }
    }

    pub fn from_config(export: &ExportConfig) -> Result<Self> {
        let query = match (&export.source_table, &export.query) {
            (Some(table), None) => SourceQuery::Table(table.clone()),
            (None, Some(sql)) => SourceQuery::Sql(sql.clone()),
            _ => {
                return Err(ExportError::invalid_config(
                    "exactly one of export.source_table and export.query must be set",
                ))
            }
        };

        let write = WriteOptions {
            partition_fields: default_partition_fields(),
            overwrite: export.overwrite,
            header: export.header,
            format: export.format,
            concurrency: export.write_concurrency,
            timeout: export.write_timeout(),
            success_marker: export.success_marker,
        };

        Ok(Self::new(query, export.transform_options(), write))
    }

    pub fn query(&self) -> &SourceQuery {
        &self.query
    }

    /// Run against `session`. Resolves exactly once.
    pub async fn execute(&self, session: &ExportSession) -> Result<RunReport> {
        let start = Instant::now();
        info!(query = %self.query, "Extracting records");

        let mut stream = session.source().extract(&self.query).await?;
        let mut extracted = 0usize;
        let mut skipped = 0usize;
        let mut records = Vec::new();

        while let Some(record) = stream.try_next().await? {
            extracted += 1;
            match transform_record(record, &self.transform)? {
                Some(record) => records.push(record),
                None => {
                    skipped += 1;
                    warn!(
                        row = extracted,
                        field = %self.transform.timestamp_field,
                        "Skipping record with null timestamp"
                    );
                }
            }
        }
        drop(stream);

        info!(
            extracted,
            skipped,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Extraction complete"
        );

        let writer = PartitionedWriter::new(session.operator().clone(), self.write.clone());
        let write = writer.write(records, session.base_path()).await?;

        Ok(RunReport {
            extracted,
            skipped_null_timestamps: skipped,
            write,
        })
    }
}

/// Resolve credentials, open a session and execute one run from `config`.
///
/// The session is released before this returns, whatever the outcome. A
/// failure is logged once with its kind, code and partition.
pub async fn run_export(
    config: &RuntimeConfig,
    provider: Arc<dyn pg2lake_secrets::SecretProvider>,
) -> Result<RunReport> {
    let outcome = async {
        let run = ExportRun::from_config(&config.export)?;
        let resolver = CredentialResolver::new(provider);
        let session = ExportSession::open(config, &resolver).await?;
        let report = run.execute(&session).await?;
        Ok::<RunReport, ExportError>(report)
    }
    .await;

    match &outcome {
        Ok(report) => info!(
            extracted = report.extracted,
            skipped = report.skipped_null_timestamps,
            partitions = report.write.partitions.len(),
            elapsed_ms = report.write.elapsed.as_millis() as u64,
            "Export run succeeded"
        ),
        Err(e) => error!(
            kind = e.code().kind(),
            code = %e.code(),
            partition = e.partition().unwrap_or("-"),
            error = %e,
            "Export run failed"
        ),
    }
    outcome
}
