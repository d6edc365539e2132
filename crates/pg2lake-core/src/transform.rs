//! Per-record transform chain: derive partition columns, then flatten the
//! configured list column.

use crate::error::{ExportError, Result};
use crate::normalize::normalize_list_field;
use crate::partition::{derive_partition, with_partition};
use crate::record::Record;
use serde::{Deserialize, Serialize};

/// What to do with a record whose partition timestamp is null
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullTimestampPolicy {
    /// Fail the run before anything is written
    #[default]
    Abort,
    /// Drop the record and keep going
    Skip,
}

impl std::fmt::Display for NullTimestampPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NullTimestampPolicy::Abort => write!(f, "abort"),
            NullTimestampPolicy::Skip => write!(f, "skip"),
        }
    }
}

impl std::str::FromStr for NullTimestampPolicy {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(NullTimestampPolicy::Abort),
            "skip" => Ok(NullTimestampPolicy::Skip),
            _ => Err(ExportError::invalid_config(format!(
                "Unsupported null timestamp policy: {}. Supported: abort, skip",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub timestamp_field: String,
    pub list_field: Option<String>,
    pub list_separator: String,
    pub on_null_timestamp: NullTimestampPolicy,
}

impl TransformOptions {
    pub fn new(timestamp_field: impl Into<String>) -> Self {
        Self {
            timestamp_field: timestamp_field.into(),
            list_field: None,
            list_separator: ",".to_string(),
            on_null_timestamp: NullTimestampPolicy::default(),
        }
    }

    pub fn with_list_field(mut self, field: impl Into<String>, separator: impl Into<String>) -> Self {
        self.list_field = Some(field.into());
        self.list_separator = separator.into();
        self
    }

    pub fn with_null_policy(mut self, policy: NullTimestampPolicy) -> Self {
        self.on_null_timestamp = policy;
        self
    }
}

/// Apply the transform chain to one record.
///
/// Returns `Ok(None)` when the record was dropped by the `skip` null policy.
pub fn transform_record(record: Record, options: &TransformOptions) -> Result<Option<Record>> {
    if let Some(list_field) = &options.list_field {
        if !record.contains(list_field) {
            return Err(ExportError::schema_mismatch(
                list_field.as_str(),
                "list column not present in record",
            ));
        }
    }

    let key = match derive_partition(&record, &options.timestamp_field) {
        Ok(key) => key,
        Err(ExportError::NullTimestamp { .. })
            if options.on_null_timestamp == NullTimestampPolicy::Skip =>
        {
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let record = with_partition(record, key);
    let record = match &options.list_field {
        Some(field) => normalize_list_field(record, field, &options.list_separator),
        None => record,
    };
    Ok(Some(record))
}
