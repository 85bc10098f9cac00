#![allow(dead_code)]

use recordsync_core::db::DbError;
use recordsync_core::{
    Conflict, EngineConfig, LocalStore, MemoryRemoteStore, Origin, PresentationSink, Record,
    StoreError, StoreResult, SyncEngine, SyncReport, SyncStatus,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Local store whose contents stay observable after the engine takes it.
#[derive(Clone, Default)]
pub struct SharedStore {
    inner: Arc<SharedStoreInner>,
}

#[derive(Default)]
struct SharedStoreInner {
    records: Mutex<Vec<Record>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
    corrupt: AtomicBool,
    failing_loads: AtomicUsize,
}

impl SharedStore {
    pub fn with_records(records: Vec<Record>) -> Self {
        let store = Self::default();
        *store.inner.records.lock().unwrap() = records;
        store
    }

    pub fn corrupt() -> Self {
        let store = Self::default();
        store.inner.corrupt.store(true, Ordering::SeqCst);
        store
    }

    pub fn records(&self) -> Vec<Record> {
        self.inner.records.lock().unwrap().clone()
    }

    pub fn saves(&self) -> usize {
        self.inner.saves.load(Ordering::SeqCst)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.inner.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// The next `count` loads report the store as unavailable.
    pub fn set_failing_loads(&self, count: usize) {
        self.inner.failing_loads.store(count, Ordering::SeqCst);
    }
}

impl LocalStore for SharedStore {
    fn load(&self) -> StoreResult<Vec<Record>> {
        let unavailable = self
            .inner
            .failing_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if unavailable {
            return Err(unavailable_error());
        }
        if self.inner.corrupt.load(Ordering::SeqCst) {
            return Err(StoreError::CorruptData("garbled payload".to_string()));
        }
        Ok(self.records())
    }

    fn save(&mut self, records: &[Record]) -> StoreResult<()> {
        if self.inner.fail_saves.load(Ordering::SeqCst) {
            return Err(unavailable_error());
        }
        self.inner.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.corrupt.store(false, Ordering::SeqCst);
        *self.inner.records.lock().unwrap() = records.to_vec();
        Ok(())
    }
}

fn unavailable_error() -> StoreError {
    StoreError::StorageUnavailable(DbError::Sqlite(rusqlite::Error::InvalidQuery))
}

/// Sink capturing every notification.
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<SyncReport>>,
    records: Mutex<Vec<Record>>,
    conflicts: Mutex<Vec<Conflict>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<SyncReport> {
        self.reports.lock().unwrap().clone()
    }

    pub fn last_status(&self) -> Option<SyncStatus> {
        self.reports.lock().unwrap().last().map(|report| report.status)
    }

    pub fn last_records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn last_conflicts(&self) -> Vec<Conflict> {
        self.conflicts.lock().unwrap().clone()
    }
}

impl PresentationSink for RecordingSink {
    fn on_status(&self, report: &SyncReport) {
        self.reports.lock().unwrap().push(report.clone());
    }

    fn on_records(&self, records: &[Record]) {
        *self.records.lock().unwrap() = records.to_vec();
    }

    fn on_conflicts(&self, pending: &[Conflict]) {
        *self.conflicts.lock().unwrap() = pending.to_vec();
    }
}

pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub store: SharedStore,
    pub remote: Arc<MemoryRemoteStore>,
    pub sink: Arc<RecordingSink>,
}

pub fn harness(store: SharedStore, remote: MemoryRemoteStore, config: EngineConfig) -> Harness {
    let remote = Arc::new(remote);
    let sink = Arc::new(RecordingSink::default());
    let engine = Arc::new(SyncEngine::open(
        Box::new(store.clone()),
        remote.clone(),
        sink.clone(),
        config,
    ));
    Harness {
        engine,
        store,
        remote,
        sink,
    }
}

pub fn local(id: &str, text: &str, category: &str, version: u32) -> Record {
    Record {
        id: id.to_string(),
        remote_id: None,
        text: text.to_string(),
        category: category.to_string(),
        version,
        last_modified: 10,
        origin: Origin::Local,
    }
}
