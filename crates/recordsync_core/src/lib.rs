//! Core reconciliation engine for RecordSync.
//! Keeps a local record set consistent with a remote authority.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod remote;
pub mod store;
pub mod sync;

pub use config::EngineConfig;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::conflict::{Conflict, ResolutionChoice};
pub use model::record::{default_records, Origin, Record, RecordId, RecordValidationError};
pub use remote::{MemoryRemoteStore, RemoteError, RemoteResult, RemoteStore};
pub use store::{LocalStore, SqliteLocalStore, StoreError, StoreResult};
pub use sync::{
    merge, ConflictLedger, EngineError, LogSink, MergeOutcome, PresentationSink,
    SchedulerHandle, SyncEngine, SyncOutcome, SyncPhase, SyncReport, SyncScheduler, SyncStatus,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
