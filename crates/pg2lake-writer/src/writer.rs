//! Partitioned writes with overwrite-by-partition semantics
//!
//! Layout: `{base}/{field}={value}/.../part-{hash}.{ext}`
//!
//! Every file is first staged under `{base}/_temporary/{run-id}/`, under the
//! write timeout. Only when all partitions have been staged are they promoted
//! into place, one task per partition path. A promotion is never cancelled
//! half way: in overwrite mode the other files directly under the partition
//! path are deleted in the same task. Partitions absent from the input are
//! never touched.

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use opendal::{ErrorKind, Operator};
use pg2lake_core::{
    default_partition_fields, encode_batch, group_by_partition, infer_schema,
    records_to_batch_with_schema, ExportError, OutputFormat, PartitionValues, Record, Result,
    SchemaRef,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const STAGING_DIR: &str = "_temporary";
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Options for [`PartitionedWriter`]
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub partition_fields: Vec<String>,
    /// Replace the contents of written partitions (`false` appends)
    pub overwrite: bool,
    /// Header row per file (CSV only)
    pub header: bool,
    pub format: OutputFormat,
    /// Partitions staged or committed at the same time
    pub concurrency: usize,
    /// Deadline for staging; commits already started always finish
    pub timeout: Duration,
    pub success_marker: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            partition_fields: default_partition_fields(),
            overwrite: true,
            header: true,
            format: OutputFormat::Csv,
            concurrency: 8,
            timeout: Duration::from_secs(300),
            success_marker: true,
        }
    }
}

/// Outcome of a successful partitioned write
#[derive(Debug, Clone)]
pub struct WriteReport {
    pub records_written: usize,
    /// Partition paths written, relative to the base path, in sorted order
    pub partitions: Vec<String>,
    /// Final file paths, relative to the operator root
    pub files: Vec<String>,
    pub elapsed: Duration,
}

/// One encoded partition file
#[derive(Clone)]
struct PartitionFile {
    partition: String,
    file_name: String,
    rows: usize,
    bytes: Bytes,
}

pub struct PartitionedWriter {
    operator: Operator,
    options: WriteOptions,
}

impl PartitionedWriter {
    pub fn new(operator: Operator, options: WriteOptions) -> Self {
        Self { operator, options }
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Group, encode, stage and commit `records` under `base_path`.
    ///
    /// Grouping and encoding finish before anything is written, and every
    /// file shares one schema inferred over all records. A failure while
    /// staging leaves every live partition untouched.
    pub async fn write(&self, records: Vec<Record>, base_path: &str) -> Result<WriteReport> {
        let start = Instant::now();
        let records_written = records.len();
        let base = normalize_base(base_path);

        let schema = infer_schema(&records, &self.options.partition_fields);
        let groups = group_by_partition(records, &self.options.partition_fields)?;
        let files = groups
            .into_iter()
            .map(|(values, records)| self.encode_partition(&values, &records, &schema))
            .collect::<Result<Vec<_>>>()?;

        let staging = format!("{}{}/{}/", base, STAGING_DIR, Uuid::new_v4().simple());
        debug!(
            staging = %staging,
            partitions = files.len(),
            records = records_written,
            "Staging partition files"
        );

        let staging_phase = self.stage_all(&files, &staging);
        let staged = match tokio::time::timeout(self.options.timeout, staging_phase).await {
            Ok(result) => result,
            Err(_) => Err(ExportError::write(
                None,
                format!("staging timed out after {:?}", self.options.timeout),
            )),
        };
        let result = match staged {
            Ok(()) => self.commit_all(&files, &base, &staging).await,
            Err(e) => Err(e),
        };

        if let Err(e) = self.remove_staging(&staging).await {
            warn!(staging = %staging, error = %e, "Failed to remove staging area");
        }
        let files_written = result?;

        if self.options.success_marker {
            let marker = format!("{}{}", base, SUCCESS_MARKER);
            self.operator
                .write(&marker, Vec::<u8>::new())
                .await
                .map_err(|e| ExportError::write(None, format!("Failed to write '{}': {}", marker, e)))?;
        }

        let report = WriteReport {
            records_written,
            partitions: files.iter().map(|f| f.partition.clone()).collect(),
            files: files_written,
            elapsed: start.elapsed(),
        };
        info!(
            records = report.records_written,
            partitions = report.partitions.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            overwrite = self.options.overwrite,
            "Partitioned write committed"
        );
        Ok(report)
    }

    fn encode_partition(
        &self,
        values: &PartitionValues,
        records: &[Record],
        schema: &SchemaRef,
    ) -> Result<PartitionFile> {
        let partition = values.path();
        let batch = records_to_batch_with_schema(records, schema)
            .map_err(|e| e.with_partition(&partition))?;
        let encoded = encode_batch(&batch, self.options.format, self.options.header)
            .map_err(|e| e.with_partition(&partition))?;

        let hash = blake3::hash(&encoded);
        let file_name = format!(
            "part-{}.{}",
            &hash.to_hex().as_str()[..16],
            self.options.format.extension()
        );

        Ok(PartitionFile {
            partition,
            file_name,
            rows: records.len(),
            bytes: Bytes::from(encoded),
        })
    }

    async fn stage_all(&self, files: &[PartitionFile], staging: &str) -> Result<()> {
        futures::stream::iter(files.iter().map(|file| self.stage(file, staging)))
            .buffer_unordered(self.options.concurrency.max(1))
            .try_collect::<Vec<()>>()
            .await?;
        Ok(())
    }

    async fn stage(&self, file: &PartitionFile, staging: &str) -> Result<()> {
        let path = format!("{}{}/{}", staging, file.partition, file.file_name);
        self.operator
            .write(&path, file.bytes.clone())
            .await
            .map(|_| ())
            .map_err(|e| {
                ExportError::write(
                    Some(file.partition.clone()),
                    format!("Failed to stage '{}': {}", path, e),
                )
            })
    }

    /// Promote every staged file, one spawned task per partition.
    ///
    /// Spawned commits run to completion even if this future is dropped.
    /// After the first failure no further partition is started; the ones
    /// already running finish before the error is returned.
    async fn commit_all(
        &self,
        files: &[PartitionFile],
        base: &str,
        staging: &str,
    ) -> Result<Vec<String>> {
        let failed = Arc::new(AtomicBool::new(false));

        let tasks = files.iter().map(|file| {
            let operator = self.operator.clone();
            let overwrite = self.options.overwrite;
            let file = file.clone();
            let base = base.to_string();
            let staging = staging.to_string();
            let failed = failed.clone();
            async move {
                let partition = file.partition.clone();
                let handle = tokio::spawn(async move {
                    if failed.load(Ordering::SeqCst) {
                        return Ok(None);
                    }
                    let result = commit(&operator, overwrite, &file, &base, &staging).await;
                    if result.is_err() {
                        failed.store(true, Ordering::SeqCst);
                    }
                    result.map(Some)
                });
                match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(ExportError::write(
                        Some(partition),
                        format!("commit task failed: {}", e),
                    )),
                }
            }
        });

        let outcomes: Vec<Result<Option<String>>> = futures::stream::iter(tasks)
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut committed = Vec::with_capacity(outcomes.len());
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(Some(path)) => committed.push(path),
                Ok(None) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        committed.sort();
        Ok(committed)
    }

    async fn remove_staging(&self, staging: &str) -> opendal::Result<()> {
        let entries = match self.operator.list_with(staging).recursive(true).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let mut dirs = BTreeSet::new();
        dirs.insert(staging.to_string());
        for entry in entries {
            let path = entry.path();
            if entry.metadata().mode().is_file() {
                self.operator.delete(path).await?;
            }
            // Every ancestor between the entry and the staging root
            let mut current = path.trim_end_matches('/');
            while let Some((parent, _)) = current.rsplit_once('/') {
                let dir = format!("{}/", parent);
                if dir.len() < staging.len() {
                    break;
                }
                dirs.insert(dir);
                current = parent;
            }
            if entry.metadata().mode().is_dir() {
                dirs.insert(path.to_string());
            }
        }

        let mut dirs: Vec<String> = dirs.into_iter().collect();
        dirs.sort_by_key(|path| std::cmp::Reverse(path.len()));
        for dir in dirs {
            self.operator.delete(&dir).await?;
        }

        let parent = staging
            .trim_end_matches('/')
            .rsplit_once('/')
            .map(|(parent, _)| format!("{}/", parent));
        if let Some(parent) = parent {
            if self.is_empty_dir(&parent).await? {
                self.operator.delete(&parent).await?;
            }
        }
        Ok(())
    }

    async fn is_empty_dir(&self, dir: &str) -> opendal::Result<bool> {
        match self.operator.list(dir).await {
            Ok(entries) => Ok(entries.iter().all(|entry| entry.path() == dir)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e),
        }
    }
}

/// Promote the staged file, then prune the partition in overwrite mode.
///
/// If the prune fails, a newly promoted file is deleted again so the
/// partition does not mix old and new rows.
async fn commit(
    operator: &Operator,
    overwrite: bool,
    file: &PartitionFile,
    base: &str,
    staging: &str,
) -> Result<String> {
    let staged = format!("{}{}/{}", staging, file.partition, file.file_name);
    let dir = format!("{}{}/", base, file.partition);
    let target = format!("{}{}", dir, file.file_name);
    let fail = |action: &str, e: opendal::Error| {
        ExportError::write(
            Some(file.partition.clone()),
            format!("Failed to {} '{}': {}", action, target, e),
        )
    };

    // Identical content from an earlier run keeps the same name
    let existed = operator.exists(&target).await.map_err(|e| fail("stat", e))?;

    let capability = operator.info().full_capability();
    if capability.rename {
        operator
            .rename(&staged, &target)
            .await
            .map_err(|e| fail("rename into", e))?;
    } else if capability.copy {
        operator
            .copy(&staged, &target)
            .await
            .map_err(|e| fail("copy into", e))?;
    } else {
        operator
            .write(&target, file.bytes.clone())
            .await
            .map_err(|e| fail("write", e))?;
    }

    if overwrite {
        if let Err(e) = prune(operator, &dir, &target, &file.partition).await {
            if !existed {
                if let Err(undo) = operator.delete(&target).await {
                    warn!(
                        partition = %file.partition,
                        path = %target,
                        error = %undo,
                        "Failed to roll back promoted file"
                    );
                }
            }
            return Err(fail("prune", e));
        }
    }

    debug!(partition = %file.partition, rows = file.rows, path = %target, "Committed partition");
    Ok(target)
}

async fn prune(operator: &Operator, dir: &str, keep: &str, partition: &str) -> opendal::Result<()> {
    for stale in list_files(operator, dir).await? {
        if stale != keep {
            operator.delete(&stale).await?;
            debug!(partition = %partition, path = %stale, "Removed stale file");
        }
    }
    Ok(())
}

/// Files directly under `dir`; a missing directory has none.
async fn list_files(operator: &Operator, dir: &str) -> opendal::Result<Vec<String>> {
    match operator.list(dir).await {
        Ok(entries) => Ok(entries
            .into_iter()
            .filter(|entry| entry.metadata().mode().is_file())
            .map(|entry| entry.path().to_string())
            .collect()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// `""` or a prefix ending in `/`
fn normalize_base(base_path: &str) -> String {
    let trimmed = base_path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}
