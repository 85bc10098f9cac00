//! Record domain model.
//!
//! # Responsibility
//! - Define the versioned record synchronized between local and remote stores.
//! - Provide constructors for the two lifecycle entry points (local create,
//!   remote materialization) and the built-in default set.
//!
//! # Invariants
//! - `version` starts at 1 and only grows.
//! - `remote_id` is set only after the remote side accepted the record.
//! - `text` and `category` are opaque to core; they are compared, never parsed.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier of a record inside one store.
///
/// Locally created records use UUID v4 text; remote records keep whatever
/// identifier the server assigned.
pub type RecordId = String;

/// Where the structural identity of a record was first created.
///
/// Informational only: conflict policy never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Created through the input source on this client.
    Local,
    /// Materialized from a remote fetch.
    Remote,
}

/// Validation failures for record invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    BlankId,
    BlankRemoteId,
    BlankText,
    BlankCategory,
    ZeroVersion,
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankId => write!(f, "record id cannot be blank"),
            Self::BlankRemoteId => write!(f, "record remote_id cannot be blank when set"),
            Self::BlankText => write!(f, "record text cannot be blank"),
            Self::BlankCategory => write!(f, "record category cannot be blank"),
            Self::ZeroVersion => write!(f, "record version must start at 1"),
        }
    }
}

impl Error for RecordValidationError {}

/// One versioned unit of synchronized data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stable id, unique within a store.
    pub id: RecordId,
    /// Server-assigned id once the remote store accepted this record.
    pub remote_id: Option<RecordId>,
    /// Payload body.
    pub text: String,
    /// Payload category.
    pub category: String,
    /// Incremented by exactly 1 on every accepted mutation.
    pub version: u32,
    /// Unix epoch milliseconds of the last accepted mutation.
    pub last_modified: i64,
    pub origin: Origin,
}

impl Record {
    /// Creates a record submitted by the input source.
    ///
    /// # Invariants
    /// - Gets a fresh UUID v4 id and no `remote_id`.
    /// - Starts at `version = 1` with `origin = Local`.
    pub fn new_local(text: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            remote_id: None,
            text: text.into(),
            category: category.into(),
            version: 1,
            last_modified: now_epoch_ms(),
            origin: Origin::Local,
        }
    }

    /// Materializes a record as the remote store reports it.
    ///
    /// The server id doubles as `remote_id`, so the record is never treated
    /// as a first-push candidate.
    pub fn remote(
        id: impl Into<RecordId>,
        text: impl Into<String>,
        category: impl Into<String>,
        version: u32,
        last_modified: i64,
    ) -> Self {
        let id = id.into();
        Self {
            remote_id: Some(id.clone()),
            id,
            text: text.into(),
            category: category.into(),
            version,
            last_modified,
            origin: Origin::Remote,
        }
    }

    /// Validates record invariants enforced at every store boundary.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.id.trim().is_empty() {
            return Err(RecordValidationError::BlankId);
        }
        if matches!(self.remote_id.as_deref(), Some(value) if value.trim().is_empty()) {
            return Err(RecordValidationError::BlankRemoteId);
        }
        if self.text.trim().is_empty() {
            return Err(RecordValidationError::BlankText);
        }
        if self.category.trim().is_empty() {
            return Err(RecordValidationError::BlankCategory);
        }
        if self.version == 0 {
            return Err(RecordValidationError::ZeroVersion);
        }
        Ok(())
    }

    /// Returns whether this record has never been accepted remotely.
    pub fn is_unpushed(&self) -> bool {
        self.remote_id.is_none()
    }

    /// Compares the `(text, category, version)` triple.
    pub fn same_content_as(&self, other: &Record) -> bool {
        self.version == other.version && self.same_payload_as(other)
    }

    /// Compares `(text, category)` only, ignoring versions.
    pub fn same_payload_as(&self, other: &Record) -> bool {
        self.text == other.text && self.category == other.category
    }

    /// Copies payload, version and timestamp from `source` as one unit.
    pub fn adopt_content_of(&mut self, source: &Record) {
        self.text = source.text.clone();
        self.category = source.category.clone();
        self.version = source.version;
        self.last_modified = source.last_modified;
    }
}

/// Built-in record set used when the local store holds unusable data.
///
/// Ids are fixed so repeated recoveries do not multiply the set.
pub fn default_records() -> Vec<Record> {
    const DEFAULTS: [(&str, &str, &str); 3] = [
        (
            "default-1",
            "The best way to predict the future is to create it.",
            "Motivation",
        ),
        (
            "default-2",
            "Simplicity is prerequisite for reliability.",
            "Engineering",
        ),
        ("default-3", "Well begun is half done.", "Wisdom"),
    ];

    let now = now_epoch_ms();
    DEFAULTS
        .iter()
        .map(|(id, text, category)| Record {
            id: (*id).to_string(),
            remote_id: None,
            text: (*text).to_string(),
            category: (*category).to_string(),
            version: 1,
            last_modified: now,
            origin: Origin::Local,
        })
        .collect()
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
