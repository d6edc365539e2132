// pg2lake - PostgreSQL to partitioned object storage exports
//
// A run resolves its credential bundles, opens an `ExportSession`, streams
// the source table through the transform chain and hands the result to the
// partitioned writer. Each run is independent and keeps no state.

mod init;
mod run;
mod session;

pub use init::{init_tracing, secret_provider};
pub use run::{run_export, ExportRun, RunReport};
pub use session::ExportSession;

pub use pg2lake_config::RuntimeConfig;
pub use pg2lake_core::{ErrorCode, ExportError};
