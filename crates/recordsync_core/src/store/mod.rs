//! Local store contracts and persistence implementations.
//!
//! # Responsibility
//! - Define the load/save boundary for the client-held record set.
//! - Reject malformed persisted data here, never inside the merge.
//!
//! # Invariants
//! - `save` replaces the whole record set atomically.
//! - `load` returns records in the order they were saved.
//! - Every loaded record passed `Record::validate()`.

use crate::db::DbError;
use crate::model::record::{Record, RecordValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite_store;

pub use sqlite_store::SqliteLocalStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Local store failures.
#[derive(Debug)]
pub enum StoreError {
    /// Persisted payload is not a well-formed record set.
    CorruptData(String),
    /// The underlying medium rejected a read or write.
    StorageUnavailable(DbError),
    /// A record handed to `save` violates record invariants.
    Rejected(RecordValidationError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CorruptData(message) => write!(f, "corrupt local record data: {message}"),
            Self::StorageUnavailable(err) => write!(f, "local storage unavailable: {err}"),
            Self::Rejected(err) => write!(f, "record rejected by local store: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CorruptData(_) => None,
            Self::StorageUnavailable(err) => Some(err),
            Self::Rejected(err) => Some(err),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::StorageUnavailable(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::StorageUnavailable(DbError::Sqlite(value))
    }
}

impl From<RecordValidationError> for StoreError {
    fn from(value: RecordValidationError) -> Self {
        Self::Rejected(value)
    }
}

/// Persistent holder of the client's record set.
///
/// Implementations must be movable into the engine's owned state, so they
/// are `Send` but need not be `Sync`.
pub trait LocalStore: Send {
    /// Loads the full persisted record set.
    fn load(&self) -> StoreResult<Vec<Record>>;
    /// Replaces the full persisted record set.
    fn save(&mut self, records: &[Record]) -> StoreResult<()>;
}
