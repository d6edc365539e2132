//! Error taxonomy shared by every stage of an export run.

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Required credential key absent or empty
    E001MissingCredential,
    /// E002: Secret store unreachable or secret not found
    E002SecretLookup,
    /// E003: Source database unreachable or authentication failed
    E003Connection,
    /// E004: Malformed table or query reference
    E004Query,
    /// E005: Partition timestamp is null
    E005NullTimestamp,
    /// E006: Storage write failed
    E006WriteFailure,
    /// E007: Record does not match the configured columns
    E007SchemaMismatch,
    /// E008: Configuration missing or invalid
    E008InvalidConfig,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001MissingCredential => "E001",
            Self::E002SecretLookup => "E002",
            Self::E003Connection => "E003",
            Self::E004Query => "E004",
            Self::E005NullTimestamp => "E005",
            Self::E006WriteFailure => "E006",
            Self::E007SchemaMismatch => "E007",
            Self::E008InvalidConfig => "E008",
        }
    }

    /// Short kind name used in the terminal run report
    pub fn kind(&self) -> &'static str {
        match self {
            Self::E001MissingCredential => "MissingCredentialError",
            Self::E002SecretLookup => "SecretLookupError",
            Self::E003Connection => "ConnectionError",
            Self::E004Query => "QueryError",
            Self::E005NullTimestamp => "NullTimestampError",
            Self::E006WriteFailure => "WriteError",
            Self::E007SchemaMismatch => "SchemaMismatchError",
            Self::E008InvalidConfig => "InvalidConfigError",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that terminate an export run
#[derive(Debug, Error)]
pub enum ExportError {
    /// A credential bundle lacks a required key
    #[error("[{code}] Credential bundle '{bundle}' is missing '{key}': {reason}")]
    MissingCredential {
        code: &'static str,
        bundle: String,
        key: String,
        reason: String,
    },

    /// The secret store could not produce the bundle
    #[error("[{code}] Secret lookup failed for '{bundle}': {message}")]
    SecretLookup {
        code: &'static str,
        bundle: String,
        message: String,
    },

    /// The source database could not be reached or rejected the login
    #[error("[{code}] Connection to '{target}' failed: {message}")]
    Connection {
        code: &'static str,
        target: String,
        message: String,
    },

    /// The table or query could not be executed
    #[error("[{code}] Query failed: {message}")]
    Query { code: &'static str, message: String },

    /// A record carries a null partition timestamp
    #[error("[{code}] Timestamp column '{field}' is null; cannot derive a partition key")]
    NullTimestamp { code: &'static str, field: String },

    /// The sink could not write or commit a partition
    #[error("[{code}] Write failed{}: {message}", partition_suffix(.partition))]
    Write {
        code: &'static str,
        partition: Option<String>,
        message: String,
    },

    /// A record does not carry the expected column or type
    #[error("[{code}] Schema mismatch on column '{field}': {message}")]
    SchemaMismatch {
        code: &'static str,
        field: String,
        message: String,
    },

    /// Invalid configuration provided
    #[error("[{code}] Invalid configuration: {message}")]
    InvalidConfig { code: &'static str, message: String },
}

fn partition_suffix(partition: &Option<String>) -> String {
    match partition {
        Some(p) => format!(" for partition '{}'", p),
        None => String::new(),
    }
}

impl ExportError {
    pub fn missing_credential(
        bundle: impl Into<String>,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MissingCredential {
            code: ErrorCode::E001MissingCredential.as_str(),
            bundle: bundle.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn secret_lookup(bundle: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SecretLookup {
            code: ErrorCode::E002SecretLookup.as_str(),
            bundle: bundle.into(),
            message: message.into(),
        }
    }

    pub fn connection(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            code: ErrorCode::E003Connection.as_str(),
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            code: ErrorCode::E004Query.as_str(),
            message: message.into(),
        }
    }

    pub fn null_timestamp(field: impl Into<String>) -> Self {
        Self::NullTimestamp {
            code: ErrorCode::E005NullTimestamp.as_str(),
            field: field.into(),
        }
    }

    pub fn write(partition: Option<String>, message: impl Into<String>) -> Self {
        Self::Write {
            code: ErrorCode::E006WriteFailure.as_str(),
            partition,
            message: message.into(),
        }
    }

    pub fn schema_mismatch(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            code: ErrorCode::E007SchemaMismatch.as_str(),
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E008InvalidConfig.as_str(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingCredential { .. } => ErrorCode::E001MissingCredential,
            Self::SecretLookup { .. } => ErrorCode::E002SecretLookup,
            Self::Connection { .. } => ErrorCode::E003Connection,
            Self::Query { .. } => ErrorCode::E004Query,
            Self::NullTimestamp { .. } => ErrorCode::E005NullTimestamp,
            Self::Write { .. } => ErrorCode::E006WriteFailure,
            Self::SchemaMismatch { .. } => ErrorCode::E007SchemaMismatch,
            Self::InvalidConfig { .. } => ErrorCode::E008InvalidConfig,
        }
    }

    /// Partition path being processed when the error occurred, if any
    pub fn partition(&self) -> Option<&str> {
        match self {
            Self::Write { partition, .. } => partition.as_deref(),
            _ => None,
        }
    }

    /// Attach a partition path to a write error that does not carry one yet.
    pub fn with_partition(self, path: &str) -> Self {
        match self {
            Self::Write {
                code,
                partition: None,
                message,
            } => Self::Write {
                code,
                partition: Some(path.to_string()),
                message,
            },
            other => other,
        }
    }
}

/// Result type alias for ExportError
pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_mentions_partition() {
        let err = ExportError::write(None, "quota exceeded").with_partition("year=2025/month=2");
        assert_eq!(err.partition(), Some("year=2025/month=2"));
        let msg = err.to_string();
        assert!(msg.starts_with("[E006]"));
        assert!(msg.contains("for partition 'year=2025/month=2'"));
    }

    #[test]
    fn with_partition_keeps_existing_partition() {
        let err = ExportError::write(Some("year=2024/month=12".into()), "boom")
            .with_partition("year=2025/month=1");
        assert_eq!(err.partition(), Some("year=2024/month=12"));
    }

    #[test]
    fn codes_map_to_kinds() {
        let err = ExportError::null_timestamp("start_date_time");
        assert_eq!(err.code(), ErrorCode::E005NullTimestamp);
        assert_eq!(err.code().kind(), "NullTimestampError");
        assert!(err.partition().is_none());
    }
}
