//! Sync engine: single owner of the record set, the ledger and the local store.
//!
//! # Responsibility
//! - Run fetch → merge → persist → push cycles.
//! - Expose the only mutation paths (add, resolve, sync) behind one phase guard.
//! - Report terminal outcomes to the presentation sink.
//!
//! # Invariants
//! - The phase word is the sole lock: a cycle holds `Syncing`, a local
//!   mutation holds `Applying`, and neither can start while the other runs.
//! - A failed or timed-out fetch never touches the local store.
//! - A failed push keeps the merged state; the retry is the next cycle.
//! - After an unreadable initial load no whole-set save runs until a later
//!   load succeeds and its rows are folded into memory.
//! - The state mutex is never held across an `.await`.

use crate::config::EngineConfig;
use crate::model::conflict::{Conflict, ResolutionChoice};
use crate::model::record::{default_records, now_epoch_ms, Record, RecordId};
use crate::remote::{accept_fetched, RemoteError, RemoteResult, RemoteStore};
use crate::store::{LocalStore, StoreError};
use crate::sync::ledger::{ConflictLedger, LedgerError};
use crate::sync::reconciler::merge;
use crate::sync::sink::{PresentationSink, SyncReport, SyncStatus};
use log::{error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Observable engine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Syncing,
    /// Transient: a cycle failed and is about to return to `Idle`.
    Failed,
    /// A direct local mutation (add/resolve) is in progress.
    Applying,
}

impl SyncPhase {
    fn to_raw(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Syncing => 1,
            Self::Failed => 2,
            Self::Applying => 3,
        }
    }

    fn from_raw(value: u8) -> Self {
        match value {
            1 => Self::Syncing,
            2 => Self::Failed,
            3 => Self::Applying,
            _ => Self::Idle,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Failed => "failed",
            Self::Applying => "applying",
        }
    }
}

/// Errors returned by engine operations driven by the input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// User-correctable input problem; no state changed.
    InvalidInput(&'static str),
    /// A record with the same `(text, category)` already exists.
    DuplicateRecord { text: String, category: String },
    ConflictNotFound(usize),
    RecordNotFound(RecordId),
    /// A sync cycle or another mutation holds the engine.
    Busy,
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::DuplicateRecord { text, category } => {
                write!(f, "record already exists: `{text}` in `{category}`")
            }
            Self::ConflictNotFound(index) => write!(f, "no pending conflict at index {index}"),
            Self::RecordNotFound(id) => write!(f, "record not found: {id}"),
            Self::Busy => write!(f, "engine busy: a sync cycle or mutation is in progress"),
        }
    }
}

impl Error for EngineError {}

impl From<LedgerError> for EngineError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::ConflictNotFound(index) => Self::ConflictNotFound(index),
            LedgerError::RecordNotFound(id) => Self::RecordNotFound(id),
        }
    }
}

/// What one `run_sync` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Rejected: another cycle or mutation held the engine.
    AlreadySyncing,
    Synced {
        cycle: u64,
        pushed: usize,
    },
    SyncedWithConflicts {
        cycle: u64,
        conflicts: usize,
        pushed: usize,
    },
    /// Nothing was applied locally.
    FetchFailed {
        cycle: u64,
        error: RemoteError,
    },
    /// Merge was applied and persisted; the push will be retried next cycle.
    PushFailed {
        cycle: u64,
        conflicts: usize,
        error: RemoteError,
    },
}

impl SyncOutcome {
    /// Status reported to the sink, `None` for rejected calls.
    pub fn status(&self) -> Option<SyncStatus> {
        match self {
            Self::AlreadySyncing => None,
            Self::Synced { .. } => Some(SyncStatus::Synced),
            Self::SyncedWithConflicts { .. } => Some(SyncStatus::Conflicts),
            Self::FetchFailed { .. } | Self::PushFailed { .. } => Some(SyncStatus::Failed),
        }
    }
}

/// Holds a non-idle phase; returns the engine to `Idle` when dropped.
struct PhaseGuard<'a> {
    phase: &'a AtomicU8,
}

impl<'a> PhaseGuard<'a> {
    fn acquire(phase: &'a AtomicU8, target: SyncPhase) -> Option<Self> {
        phase
            .compare_exchange(
                SyncPhase::Idle.to_raw(),
                target.to_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| Self { phase })
    }

    fn mark(&self, phase: SyncPhase) {
        self.phase.store(phase.to_raw(), Ordering::Release);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.phase
            .store(SyncPhase::Idle.to_raw(), Ordering::Release);
    }
}

struct EngineState {
    records: Vec<Record>,
    ledger: ConflictLedger,
    store: Box<dyn LocalStore>,
    unsaved: bool,
    load_pending: bool,
}

impl EngineState {
    /// Saves the full record set; failures are logged and retried on the
    /// next save while memory stays authoritative.
    fn persist(&mut self, reason: &'static str) {
        if !self.ensure_loaded(reason) {
            self.unsaved = true;
            return;
        }
        match self.store.save(&self.records) {
            Ok(()) => self.unsaved = false,
            Err(err) => {
                self.unsaved = true;
                warn!(
                    "event=store_save module=engine status=deferred reason={reason} retry=next_save error={err}"
                );
            }
        }
    }

    /// Retries a failed initial load and folds the stored rows into memory.
    ///
    /// Returns `false` while the store stays unreadable; saving then would
    /// overwrite rows this engine has never seen.
    fn ensure_loaded(&mut self, reason: &'static str) -> bool {
        if !self.load_pending {
            return true;
        }
        match self.store.load() {
            Ok(stored) => {
                let restored = absorb_stored(&mut self.records, stored);
                self.load_pending = false;
                info!(
                    "event=store_load module=engine status=recovered reason={reason} restored={restored}"
                );
                true
            }
            Err(StoreError::CorruptData(message)) => {
                self.load_pending = false;
                warn!(
                    "event=store_load module=engine status=recovered reason={reason} fallback=memory error={message}"
                );
                true
            }
            Err(err) => {
                warn!(
                    "event=store_save module=engine status=deferred reason={reason} blocked=initial_load_failed retry=next_save error={err}"
                );
                false
            }
        }
    }
}

/// Reconciliation engine bound to one local store and one remote store.
pub struct SyncEngine {
    config: EngineConfig,
    remote: Arc<dyn RemoteStore>,
    sink: Arc<dyn PresentationSink>,
    phase: AtomicU8,
    cycle: AtomicU64,
    sync_requested: AtomicBool,
    sync_signal: Notify,
    state: Mutex<EngineState>,
}

impl SyncEngine {
    /// Loads the local record set and builds an idle engine.
    ///
    /// Corrupt local data is replaced by `default_records()` and persisted
    /// immediately; the sink is not told about it. Any other load failure
    /// starts the engine empty with saves blocked until the store is
    /// readable again.
    pub fn open(
        mut store: Box<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        sink: Arc<dyn PresentationSink>,
        config: EngineConfig,
    ) -> Self {
        let initial = load_initial(store.as_mut(), &config);
        Self {
            config,
            remote,
            sink,
            phase: AtomicU8::new(SyncPhase::Idle.to_raw()),
            cycle: AtomicU64::new(0),
            sync_requested: AtomicBool::new(false),
            sync_signal: Notify::new(),
            state: Mutex::new(EngineState {
                records: initial.records,
                ledger: ConflictLedger::new(),
                store,
                unsaved: initial.unsaved,
                load_pending: initial.load_pending,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> SyncPhase {
        SyncPhase::from_raw(self.phase.load(Ordering::Acquire))
    }

    /// Number of the most recently started cycle (0 before the first one).
    pub fn last_cycle(&self) -> u64 {
        self.cycle.load(Ordering::Acquire)
    }

    /// Snapshot of the in-memory record set.
    pub fn records(&self) -> Vec<Record> {
        self.lock_state().records.clone()
    }

    /// Snapshot of unresolved conflicts.
    pub fn pending_conflicts(&self) -> Vec<Conflict> {
        self.lock_state().ledger.pending()
    }

    /// "Conflicts pending" signal shown alongside `Idle`.
    pub fn has_pending_conflicts(&self) -> bool {
        !self.lock_state().ledger.is_empty()
    }

    /// Whether the last save attempt failed and memory is ahead of storage.
    pub fn has_unsaved_changes(&self) -> bool {
        self.lock_state().unsaved
    }

    /// Whether a sync was requested and no cycle has started since.
    pub fn is_sync_requested(&self) -> bool {
        self.sync_requested.load(Ordering::Acquire)
    }

    /// Asks the scheduler to run a cycle as soon as possible.
    pub fn request_sync(&self) {
        self.sync_requested.store(true, Ordering::Release);
        self.sync_signal.notify_one();
    }

    pub(crate) fn sync_signal(&self) -> &Notify {
        &self.sync_signal
    }

    /// Adds a record submitted by the input source.
    ///
    /// # Errors
    /// - `InvalidInput` when `text` or `category` is blank after trimming.
    /// - `DuplicateRecord` when the trimmed pair already exists.
    /// - `Busy` while a sync cycle is in flight.
    pub fn add_record(&self, text: &str, category: &str) -> Result<Record, EngineError> {
        let text = text.trim();
        let category = category.trim();
        if text.is_empty() {
            return Err(EngineError::InvalidInput("text cannot be empty"));
        }
        if category.is_empty() {
            return Err(EngineError::InvalidInput("category cannot be empty"));
        }

        let guard =
            PhaseGuard::acquire(&self.phase, SyncPhase::Applying).ok_or(EngineError::Busy)?;
        let (record, snapshot) = {
            let mut state = self.lock_state();
            state.ensure_loaded("record_add");
            if state
                .records
                .iter()
                .any(|existing| existing.text == text && existing.category == category)
            {
                info!("event=record_add module=engine status=rejected reason=duplicate");
                return Err(EngineError::DuplicateRecord {
                    text: text.to_string(),
                    category: category.to_string(),
                });
            }

            let record = Record::new_local(text, category);
            state.records.push(record.clone());
            state.persist("record_add");
            (record, state.records.clone())
        };
        drop(guard);

        info!(
            "event=record_add module=engine status=ok record_id={}",
            record.id
        );
        self.sink.on_records(&snapshot);
        Ok(record)
    }

    /// Overrides the default resolution of the pending conflict at `index`.
    ///
    /// Persists the updated record and requests a new cycle so the choice
    /// reaches the remote store.
    pub fn resolve_conflict(
        &self,
        index: usize,
        choice: ResolutionChoice,
    ) -> Result<Record, EngineError> {
        let guard =
            PhaseGuard::acquire(&self.phase, SyncPhase::Applying).ok_or(EngineError::Busy)?;
        let (resolved, records, pending) = {
            let mut guard_state = self.lock_state();
            let state = &mut *guard_state;
            let resolved = state
                .ledger
                .resolve(index, choice, &mut state.records, now_epoch_ms())?;
            state.persist("conflict_resolve");
            (resolved, state.records.clone(), state.ledger.pending())
        };
        drop(guard);

        info!(
            "event=conflict_resolve module=engine status=ok record_id={} choice={} version={}",
            resolved.id,
            choice.as_str(),
            resolved.version
        );
        self.request_sync();
        self.sink.on_records(&records);
        self.sink.on_conflicts(&pending);
        Ok(resolved)
    }

    /// Runs one reconciliation cycle.
    ///
    /// Returns `AlreadySyncing` without side effects when the engine is not
    /// idle; calls are never queued.
    pub async fn run_sync(&self) -> SyncOutcome {
        let Some(guard) = PhaseGuard::acquire(&self.phase, SyncPhase::Syncing) else {
            info!(
                "event=sync_cycle module=engine status=skipped reason=busy phase={}",
                self.phase().as_str()
            );
            return SyncOutcome::AlreadySyncing;
        };
        let cycle = self.cycle.fetch_add(1, Ordering::AcqRel) + 1;
        self.sync_requested.store(false, Ordering::Release);
        let started_at = Instant::now();
        info!("event=sync_cycle module=engine status=start cycle={cycle}");

        let fetched = match self.fetch_remote(cycle).await {
            Ok(records) => records,
            Err(err) => {
                guard.mark(SyncPhase::Failed);
                error!(
                    "event=sync_cycle module=engine status=error cycle={cycle} stage=fetch duration_ms={} error_code={}",
                    started_at.elapsed().as_millis(),
                    err.code()
                );
                drop(guard);
                self.sink.on_status(&SyncReport {
                    cycle,
                    status: SyncStatus::Failed,
                    detail: format!("fetch failed: {err}"),
                });
                return SyncOutcome::FetchFailed { cycle, error: err };
            }
        };

        let (conflicts, outgoing) = self.commit_merge(cycle, &fetched);
        let conflict_count = conflicts.len();

        let mut pushed = 0;
        let mut push_error = None;
        if !outgoing.is_empty() {
            match self.push_remote(cycle, &outgoing).await {
                Ok(acks) => pushed = self.commit_acks(&acks),
                Err(err) => push_error = Some(err),
            }
        }

        let (records, pending) = self.record_conflicts(conflicts);

        let (outcome, report) = match push_error {
            Some(err) => {
                guard.mark(SyncPhase::Failed);
                let report = SyncReport {
                    cycle,
                    status: SyncStatus::Failed,
                    detail: format!("push failed, merged state kept locally: {err}"),
                };
                (
                    SyncOutcome::PushFailed {
                        cycle,
                        conflicts: conflict_count,
                        error: err,
                    },
                    report,
                )
            }
            None if conflict_count > 0 => (
                SyncOutcome::SyncedWithConflicts {
                    cycle,
                    conflicts: conflict_count,
                    pushed,
                },
                SyncReport {
                    cycle,
                    status: SyncStatus::Conflicts,
                    detail: format!("{conflict_count} conflict(s) resolved remote-wins, review pending"),
                },
            ),
            None => (
                SyncOutcome::Synced { cycle, pushed },
                SyncReport {
                    cycle,
                    status: SyncStatus::Synced,
                    detail: format!("{} record(s), {pushed} pushed", records.len()),
                },
            ),
        };
        drop(guard);

        info!(
            "event=sync_cycle module=engine status={} cycle={cycle} duration_ms={} conflicts={conflict_count} pushed={pushed}",
            report.status,
            started_at.elapsed().as_millis()
        );
        self.sink.on_records(&records);
        self.sink.on_conflicts(&pending);
        self.sink.on_status(&report);
        outcome
    }

    async fn fetch_remote(&self, cycle: u64) -> RemoteResult<Vec<Record>> {
        let started_at = Instant::now();
        let result = bounded(
            self.config.request_timeout,
            self.remote.fetch(self.config.fetch_limit),
        )
        .await
        .and_then(accept_fetched);

        match &result {
            Ok(records) => info!(
                "event=remote_fetch module=engine status=ok cycle={cycle} count={} duration_ms={}",
                records.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=remote_fetch module=engine status=error cycle={cycle} duration_ms={} error_code={} error={err}",
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        result
    }

    async fn push_remote(&self, cycle: u64, records: &[Record]) -> RemoteResult<Vec<Record>> {
        let started_at = Instant::now();
        let result = bounded(self.config.request_timeout, self.remote.push(records)).await;

        match &result {
            Ok(acks) => info!(
                "event=remote_push module=engine status=ok cycle={cycle} submitted={} accepted={} duration_ms={}",
                records.len(),
                acks.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=remote_push module=engine status=error cycle={cycle} submitted={} duration_ms={} error_code={} retry=next_tick error={err}",
                records.len(),
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        result
    }

    /// Merges the fetched set into memory and persists it.
    ///
    /// Returns the detected conflicts and the records to push.
    fn commit_merge(&self, cycle: u64, fetched: &[Record]) -> (Vec<Conflict>, Vec<Record>) {
        let mut state = self.lock_state();
        state.ensure_loaded("merge");
        let outcome = merge(&state.records, fetched, now_epoch_ms());
        info!(
            "event=merge module=engine status=ok cycle={cycle} local={} remote={} merged={} conflicts={} outgoing={}",
            state.records.len(),
            fetched.len(),
            outcome.merged.len(),
            outcome.conflicts.len(),
            outcome.outgoing.len()
        );

        state.records = outcome.merged;
        state.persist("merge");

        let wanted: HashSet<&RecordId> = outcome.outgoing.iter().collect();
        let outgoing = state
            .records
            .iter()
            .filter(|record| wanted.contains(&record.id))
            .cloned()
            .collect();
        (outcome.conflicts, outgoing)
    }

    /// Records server-assigned ids and versions; returns how many applied.
    fn commit_acks(&self, acks: &[Record]) -> usize {
        let mut state = self.lock_state();
        let applied = apply_acks(&mut state.records, acks);
        if applied > 0 {
            state.persist("push_ack");
        }
        applied
    }

    fn record_conflicts(&self, conflicts: Vec<Conflict>) -> (Vec<Record>, Vec<Conflict>) {
        let mut state = self.lock_state();
        if !conflicts.is_empty() {
            state.ledger.record(conflicts);
        }
        (state.records.clone(), state.ledger.pending())
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct InitialLoad {
    records: Vec<Record>,
    unsaved: bool,
    load_pending: bool,
}

fn load_initial(store: &mut dyn LocalStore, config: &EngineConfig) -> InitialLoad {
    match store.load() {
        Ok(records) if records.is_empty() && config.seed_defaults_when_empty => {
            info!("event=store_load module=engine status=seeded reason=empty_store");
            seed_defaults(store)
        }
        Ok(records) => InitialLoad {
            records,
            unsaved: false,
            load_pending: false,
        },
        Err(StoreError::CorruptData(message)) => {
            warn!(
                "event=store_load module=engine status=recovered reason=corrupt_data fallback=defaults error={message}"
            );
            seed_defaults(store)
        }
        Err(err) => {
            error!(
                "event=store_load module=engine status=error fallback=empty saves=blocked error={err}"
            );
            InitialLoad {
                records: Vec::new(),
                unsaved: true,
                load_pending: true,
            }
        }
    }
}

fn seed_defaults(store: &mut dyn LocalStore) -> InitialLoad {
    let records = default_records();
    let unsaved = match store.save(&records) {
        Ok(()) => false,
        Err(err) => {
            warn!(
                "event=store_save module=engine status=deferred reason=seed_defaults retry=next_save error={err}"
            );
            true
        }
    };
    InitialLoad {
        records,
        unsaved,
        load_pending: false,
    }
}

/// Folds rows read late from the store into the in-memory set.
///
/// Stored order comes first, then records only memory knows. On an id
/// collision the higher version wins and memory wins ties. Returns how many
/// stored records were new to memory.
fn absorb_stored(records: &mut Vec<Record>, stored: Vec<Record>) -> usize {
    let mut memory: Vec<Option<Record>> = std::mem::take(records).into_iter().map(Some).collect();
    let mut restored = 0;
    for stored_record in stored {
        let current = memory
            .iter_mut()
            .find(|slot| matches!(slot, Some(record) if record.id == stored_record.id))
            .and_then(Option::take);
        match current {
            Some(current) if current.version >= stored_record.version => records.push(current),
            Some(_) => records.push(stored_record),
            None => {
                restored += 1;
                records.push(stored_record);
            }
        }
    }
    records.extend(memory.into_iter().flatten());
    restored
}

/// Applies push acknowledgements to matching records.
///
/// An acknowledgement only links ids and versions; it never changes a
/// record's payload.
fn apply_acks(records: &mut [Record], acks: &[Record]) -> usize {
    let mut applied = 0;
    for ack in acks {
        let Some(remote_id) = ack.remote_id.as_deref().filter(|id| !id.trim().is_empty()) else {
            continue;
        };
        let Some(record) = records.iter_mut().find(|record| record.id == ack.id) else {
            continue;
        };
        if !record.same_payload_as(ack) {
            continue;
        }

        record.remote_id = Some(remote_id.to_string());
        if ack.version >= record.version {
            record.version = ack.version;
            record.last_modified = ack.last_modified;
        }
        applied += 1;
    }
    applied
}

async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = RemoteResult<T>>,
) -> RemoteResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(RemoteError::Timeout(limit)))
}

#[cfg(test)]
mod tests {
    use super::{absorb_stored, apply_acks, PhaseGuard, SyncPhase};
    use crate::model::record::Record;
    use std::sync::atomic::{AtomicU8, Ordering};

    #[test]
    fn phase_guard_is_exclusive_and_resets_to_idle() {
        let phase = AtomicU8::new(SyncPhase::Idle.to_raw());
        let first = PhaseGuard::acquire(&phase, SyncPhase::Syncing).expect("idle engine");
        assert!(PhaseGuard::acquire(&phase, SyncPhase::Applying).is_none());

        first.mark(SyncPhase::Failed);
        assert_eq!(
            SyncPhase::from_raw(phase.load(Ordering::Acquire)),
            SyncPhase::Failed
        );
        drop(first);
        assert_eq!(
            SyncPhase::from_raw(phase.load(Ordering::Acquire)),
            SyncPhase::Idle
        );
    }

    #[test]
    fn apply_acks_links_ids_but_never_changes_payload() {
        let mut local = Record::new_local("New", "Y");
        local.last_modified = 5;
        let mut records = vec![local.clone()];

        let mut ack = local.clone();
        ack.remote_id = Some("r-1".to_string());
        ack.last_modified = 9;
        let mut stale_ack = local.clone();
        stale_ack.text = "Other".to_string();
        stale_ack.remote_id = Some("r-2".to_string());

        assert_eq!(apply_acks(&mut records, &[stale_ack]), 0);
        assert!(records[0].is_unpushed());

        assert_eq!(apply_acks(&mut records, &[ack]), 1);
        assert_eq!(records[0].remote_id.as_deref(), Some("r-1"));
        assert_eq!(records[0].text, "New");
        assert_eq!(records[0].last_modified, 9);
    }

    #[test]
    fn absorb_stored_keeps_stored_order_and_the_newer_copy() {
        let mut in_memory = Record::new_local("Fresh", "Y");
        in_memory.id = "b".to_string();
        in_memory.version = 2;
        let added = Record::new_local("Added", "Y");
        let mut records = vec![in_memory, added.clone()];

        let mut stale = Record::new_local("Stale", "Y");
        stale.id = "b".to_string();
        let mut draft = Record::new_local("Draft", "X");
        draft.id = "a".to_string();

        let restored = absorb_stored(&mut records, vec![draft, stale]);

        assert_eq!(restored, 1);
        let texts: Vec<&str> = records.iter().map(|record| record.text.as_str()).collect();
        assert_eq!(texts, ["Draft", "Fresh", "Added"]);
        assert_eq!(records[2].id, added.id);
    }
}
