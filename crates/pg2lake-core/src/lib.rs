// pg2lake-core - Pure export logic
//
// Record model, error taxonomy, partition derivation, list normalization and
// file encoding. No I/O, no async, no runtime dependencies.

pub mod encoding;
pub mod error;
pub mod normalize;
pub mod partition;
pub mod record;
pub mod transform;

// Re-export commonly used types
pub use encoding::{
    encode_batch, infer_schema, records_to_batch, records_to_batch_with_schema, OutputFormat,
};
pub use error::{ErrorCode, ExportError, Result};
pub use normalize::{join_list, normalize_list_field, split_joined};
pub use partition::{
    default_partition_fields, derive_partition, group_by_partition, with_partition,
    PartitionKey, PartitionValues, DEFAULT_PARTITION_VALUE, MONTH_COLUMN, YEAR_COLUMN,
};
pub use record::{Record, Value};
pub use transform::{transform_record, NullTimestampPolicy, TransformOptions};

// Shared by every file of one write
pub use arrow::datatypes::SchemaRef;
