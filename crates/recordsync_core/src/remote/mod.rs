//! Remote store client contracts.
//!
//! # Responsibility
//! - Define the async fetch/push boundary to the authoritative record set.
//! - Validate fetched batches before they reach reconciliation.
//!
//! # Invariants
//! - `push` acknowledgements echo the submitted local `id`.
//! - A fetched batch with invalid or duplicate records is rejected whole.
//! - Every accepted fetched record carries a `remote_id`: the server owns it,
//!   so it can never look like a first-push candidate.

use crate::model::record::Record;
use async_trait::async_trait;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub mod memory;

pub use memory::MemoryRemoteStore;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote store failures. All of them are transient from the engine's view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Transport-level failure (unreachable, reset, DNS, ...).
    Network(String),
    /// Non-success response from the server.
    Server { status: u16, message: String },
    /// The call did not complete within the configured bound.
    Timeout(Duration),
    /// The server answered with records that fail validation.
    Malformed(String),
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::Server { status, message } => write!(f, "server error {status}: {message}"),
            Self::Timeout(after) => write!(f, "remote call timed out after {}ms", after.as_millis()),
            Self::Malformed(message) => write!(f, "malformed remote data: {message}"),
        }
    }
}

impl Error for RemoteError {}

impl RemoteError {
    /// Stable short code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "network_error",
            Self::Server { .. } => "server_error",
            Self::Timeout(_) => "timeout",
            Self::Malformed(_) => "malformed_response",
        }
    }
}

/// Network collaborator holding the authoritative record collection.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches the remote record set, optionally capped at `limit` records.
    async fn fetch(&self, limit: Option<u32>) -> RemoteResult<Vec<Record>>;

    /// Submits records and returns one acknowledgement per accepted record.
    ///
    /// Each acknowledgement echoes the submitted `id` and carries the
    /// server-assigned `remote_id`, `version` and `last_modified`.
    async fn push(&self, records: &[Record]) -> RemoteResult<Vec<Record>>;
}

/// Checks a fetched batch: every record valid, ids unique.
pub fn validate_fetched(records: &[Record]) -> RemoteResult<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        record
            .validate()
            .map_err(|err| RemoteError::Malformed(format!("record `{}`: {err}", record.id)))?;
        if !seen.insert(record.id.as_str()) {
            return Err(RemoteError::Malformed(format!(
                "duplicate record id `{}`",
                record.id
            )));
        }
    }
    Ok(())
}

/// Validates a fetched batch and links every record to its server id.
///
/// Servers are not required to echo `remote_id`; a missing one is taken
/// from the record's own `id`.
pub fn accept_fetched(mut records: Vec<Record>) -> RemoteResult<Vec<Record>> {
    validate_fetched(&records)?;
    for record in &mut records {
        if record.remote_id.is_none() {
            record.remote_id = Some(record.id.clone());
        }
    }
    Ok(records)
}
