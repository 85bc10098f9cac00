//! Reconciliation: merge, conflict bookkeeping, the engine and its scheduler.
//!
//! # Responsibility
//! - `reconciler`: pure merge of local and remote record sets.
//! - `ledger`: pending conflicts and manual overrides.
//! - `engine`: guarded owner of all mutable state.
//! - `scheduler`: timer and on-demand triggers.
//! - `sink`: outward status reporting.

pub mod engine;
pub mod ledger;
pub mod reconciler;
pub mod scheduler;
pub mod sink;

pub use engine::{EngineError, SyncEngine, SyncOutcome, SyncPhase};
pub use ledger::{ConflictLedger, LedgerError};
pub use reconciler::{merge, MergeOutcome};
pub use scheduler::{SchedulerHandle, SyncScheduler};
pub use sink::{LogSink, PresentationSink, SyncReport, SyncStatus};
