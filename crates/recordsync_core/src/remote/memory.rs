//! In-process reference remote store.
//!
//! Behaves like a minimal authoritative server: assigns `r-<n>` ids to new
//! records, accepts updates only when they carry a higher version, and
//! supports one-shot failure injection and artificial latency.

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::model::record::Record;
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct ServerState {
    records: Vec<Record>,
    next_id: u64,
    fail_next_fetch: Option<RemoteError>,
    fail_next_push: Option<RemoteError>,
    latency: Option<Duration>,
    fetch_calls: usize,
    push_calls: usize,
}

/// Remote store kept entirely in memory.
#[derive(Default)]
pub struct MemoryRemoteStore {
    state: Mutex<ServerState>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a server already holding `records`.
    pub fn with_records(records: Vec<Record>) -> Self {
        let store = Self::new();
        store.lock().records = records;
        store
    }

    /// Simulates another client creating a record on the server.
    pub fn insert_remote(&self, text: &str, category: &str, last_modified: i64) -> Record {
        let mut state = self.lock();
        let id = state.allocate_id();
        let record = Record::remote(id, text, category, 1, last_modified);
        state.records.push(record.clone());
        record
    }

    /// Simulates another client editing a server record; bumps its version.
    pub fn update_remote(
        &self,
        id: &str,
        text: &str,
        category: &str,
        last_modified: i64,
    ) -> Option<Record> {
        let mut state = self.lock();
        let record = state.records.iter_mut().find(|record| record.id == id)?;
        record.text = text.to_string();
        record.category = category.to_string();
        record.version += 1;
        record.last_modified = last_modified;
        Some(record.clone())
    }

    /// Snapshot of the server-side record set.
    pub fn records(&self) -> Vec<Record> {
        self.lock().records.clone()
    }

    /// Makes the next `fetch` fail with `err`.
    pub fn fail_next_fetch(&self, err: RemoteError) {
        self.lock().fail_next_fetch = Some(err);
    }

    /// Makes the next `push` fail with `err`.
    pub fn fail_next_push(&self, err: RemoteError) {
        self.lock().fail_next_push = Some(err);
    }

    /// Delays every call by `latency` before it is served.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    pub fn fetch_calls(&self) -> usize {
        self.lock().fetch_calls
    }

    pub fn push_calls(&self) -> usize {
        self.lock().push_calls
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl ServerState {
    fn allocate_id(&mut self) -> String {
        loop {
            self.next_id += 1;
            let candidate = format!("r-{}", self.next_id);
            if !self.records.iter().any(|record| record.id == candidate) {
                return candidate;
            }
        }
    }

    fn accept(&mut self, submitted: &Record) -> Option<Record> {
        let existing = submitted
            .remote_id
            .as_deref()
            .and_then(|remote_id| self.position_of(remote_id))
            .or_else(|| self.position_of(submitted.id.as_str()));

        let stored = match existing {
            Some(index) => {
                let current = &mut self.records[index];
                if submitted.version <= current.version {
                    return None;
                }
                current.adopt_content_of(submitted);
                current.clone()
            }
            None => {
                let id = self.allocate_id();
                let created = Record::remote(
                    id,
                    submitted.text.as_str(),
                    submitted.category.as_str(),
                    submitted.version,
                    submitted.last_modified,
                );
                self.records.push(created.clone());
                created
            }
        };

        Some(Record {
            id: submitted.id.clone(),
            remote_id: Some(stored.id.clone()),
            text: stored.text,
            category: stored.category,
            version: stored.version,
            last_modified: stored.last_modified,
            origin: submitted.origin,
        })
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn fetch(&self, limit: Option<u32>) -> RemoteResult<Vec<Record>> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.fetch_calls += 1;
        if let Some(err) = state.fail_next_fetch.take() {
            return Err(err);
        }

        let take = limit.map_or(usize::MAX, |value| value as usize);
        Ok(state.records.iter().take(take).cloned().collect())
    }

    async fn push(&self, records: &[Record]) -> RemoteResult<Vec<Record>> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.push_calls += 1;
        if let Some(err) = state.fail_next_push.take() {
            return Err(err);
        }

        Ok(records
            .iter()
            .filter_map(|record| state.accept(record))
            .collect())
    }
}
