//! Pending conflict bookkeeping and manual resolution.
//!
//! # Responsibility
//! - Hold conflicts detected by sync cycles until a human resolves them.
//! - Apply a manual choice to the in-memory record set.
//!
//! # Invariants
//! - At most one pending conflict per record id (latest detection wins).
//! - A resolved record's version is above both captured sides.
//! - A failed resolution leaves both the ledger and the records untouched.

use crate::model::conflict::{Conflict, ResolutionChoice};
use crate::model::record::{Record, RecordId};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Manual resolution failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    ConflictNotFound(usize),
    RecordNotFound(RecordId),
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConflictNotFound(index) => write!(f, "no pending conflict at index {index}"),
            Self::RecordNotFound(id) => write!(f, "record not found for conflict: {id}"),
        }
    }
}

impl Error for LedgerError {}

/// Unresolved conflicts in detection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictLedger {
    pending: Vec<Conflict>,
}

impl ConflictLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one cycle's findings.
    ///
    /// A still-pending conflict for the same record id is superseded by the
    /// newer detection.
    pub fn record(&mut self, conflicts: Vec<Conflict>) {
        for conflict in conflicts {
            self.pending
                .retain(|existing| existing.record_id() != conflict.record_id());
            self.pending.push(conflict);
        }
    }

    /// Applies `choice` for the conflict at `index` to `records`.
    ///
    /// The matching record takes the chosen side's text and category, gets
    /// `version = max(local, remote, current) + 1` and `last_modified = now`.
    /// Returns the updated record; the conflict leaves the pending set.
    pub fn resolve(
        &mut self,
        index: usize,
        choice: ResolutionChoice,
        records: &mut [Record],
        now: i64,
    ) -> Result<Record, LedgerError> {
        let conflict = self
            .pending
            .get(index)
            .ok_or(LedgerError::ConflictNotFound(index))?;
        let record = records
            .iter_mut()
            .find(|record| record.id == conflict.record_id())
            .ok_or_else(|| LedgerError::RecordNotFound(conflict.record_id().to_string()))?;

        let chosen = match choice {
            ResolutionChoice::Local => &conflict.local,
            ResolutionChoice::Remote => &conflict.remote,
        };
        record.text = chosen.text.clone();
        record.category = chosen.category.clone();
        record.version = conflict
            .local
            .version
            .max(conflict.remote.version)
            .max(record.version)
            + 1;
        record.last_modified = now;
        let resolved = record.clone();

        self.pending.remove(index);
        Ok(resolved)
    }

    /// Read-only snapshot for presentation.
    pub fn pending(&self) -> Vec<Conflict> {
        self.pending.clone()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
