//! Presentation sink contract.
//!
//! The sink only observes: it is handed reports and snapshots and has no
//! path back into engine state except the engine's own operations.

use crate::model::conflict::Conflict;
use crate::model::record::Record;
use log::{info, warn};
use std::fmt::{Display, Formatter};

/// Terminal status of one sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    Failed,
    Conflicts,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Failed => "failed",
            Self::Conflicts => "conflicts",
        }
    }
}

impl Display for SyncStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification delivered at the end of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Cycle number, increasing per engine.
    pub cycle: u64,
    pub status: SyncStatus,
    /// Human-readable summary (error message on failure).
    pub detail: String,
}

/// Observer receiving sync outcomes, record snapshots and pending conflicts.
pub trait PresentationSink: Send + Sync {
    fn on_status(&self, report: &SyncReport);

    fn on_records(&self, _records: &[Record]) {}

    fn on_conflicts(&self, _pending: &[Conflict]) {}
}

/// Sink that only writes reports to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl PresentationSink for LogSink {
    fn on_status(&self, report: &SyncReport) {
        match report.status {
            SyncStatus::Failed => warn!(
                "event=sync_report module=sink status={} cycle={} detail={}",
                report.status, report.cycle, report.detail
            ),
            _ => info!(
                "event=sync_report module=sink status={} cycle={} detail={}",
                report.status, report.cycle, report.detail
            ),
        }
    }

    fn on_conflicts(&self, pending: &[Conflict]) {
        if !pending.is_empty() {
            info!(
                "event=conflicts_pending module=sink count={}",
                pending.len()
            );
        }
    }
}
