//! Output prefix URI parsing.

use anyhow::{bail, Result};
use std::fmt;

/// Parsed `export.output_prefix`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLocation {
    /// `s3://bucket/prefix` or `s3a://bucket/prefix`
    S3 { bucket: String, prefix: String },
    /// `file:///path` or a bare path; the path becomes the operator root
    Fs { root: String },
    /// `memory://prefix`, in-process storage
    Memory { prefix: String },
}

impl OutputLocation {
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            bail!("output prefix must not be empty");
        }

        if let Some(rest) = uri
            .strip_prefix("s3://")
            .or_else(|| uri.strip_prefix("s3a://"))
        {
            let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
            if bucket.is_empty() {
                bail!("output prefix '{}' has no bucket name", uri);
            }
            return Ok(OutputLocation::S3 {
                bucket: bucket.to_string(),
                prefix: prefix.trim_matches('/').to_string(),
            });
        }

        if let Some(rest) = uri.strip_prefix("memory://") {
            return Ok(OutputLocation::Memory {
                prefix: rest.trim_matches('/').to_string(),
            });
        }

        if let Some(path) = uri.strip_prefix("file://") {
            if path.is_empty() {
                bail!("output prefix '{}' has no path", uri);
            }
            return Ok(OutputLocation::Fs {
                root: path.to_string(),
            });
        }

        if let Some((scheme, _)) = uri.split_once("://") {
            bail!(
                "Unsupported output scheme '{}://'. Supported: s3://, s3a://, file://, memory://",
                scheme
            );
        }

        Ok(OutputLocation::Fs {
            root: uri.to_string(),
        })
    }

    /// Path of the export root relative to the storage operator root
    pub fn base_path(&self) -> &str {
        match self {
            OutputLocation::S3 { prefix, .. } | OutputLocation::Memory { prefix } => prefix,
            OutputLocation::Fs { .. } => "",
        }
    }

    pub fn is_s3(&self) -> bool {
        matches!(self, OutputLocation::S3 { .. })
    }
}

impl fmt::Display for OutputLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputLocation::S3 { bucket, prefix } => write!(f, "s3://{}/{}", bucket, prefix),
            OutputLocation::Fs { root } => write!(f, "file://{}", root),
            OutputLocation::Memory { prefix } => write!(f, "memory://{}", prefix),
        }
    }
}
