// pg2lake-source - Record extraction
//
// A `RecordSource` turns a table or query reference into a lazily produced,
// finite stream of records. Implementations:
// - PostgresSource (tokio-postgres)
// - MemorySource (embedding and tests)

use async_trait::async_trait;
use futures::stream::BoxStream;
use pg2lake_core::{Record, Result};

mod connection;
mod convert;
mod memory;
mod postgres;
mod query;

pub use connection::ConnectionSpec;
pub use memory::MemorySource;
pub use postgres::{PostgresOptions, PostgresSource};
pub use query::SourceQuery;

/// Stream of extracted records; the first error ends the extract
pub type RecordStream = BoxStream<'static, Result<Record>>;

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Start extracting `query`. The column set is the same on every call.
    async fn extract(&self, query: &SourceQuery) -> Result<RecordStream>;
}
