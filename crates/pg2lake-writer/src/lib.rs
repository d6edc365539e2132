//! Partitioned sink writer for pg2lake
//!
//! Writes grouped records as one CSV or Parquet file per partition to any
//! OpenDAL backend (filesystem, S3, memory), replacing only the partitions
//! present in the input.

mod storage;
mod writer;

pub use storage::{default_s3_endpoint, initialize_storage};
pub use writer::{
    PartitionedWriter, WriteOptions, WriteReport, STAGING_DIR, SUCCESS_MARKER,
};

// Re-export for callers building their own operators
pub use opendal;
