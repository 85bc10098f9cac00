//! Conflict value objects produced by reconciliation.

use crate::model::record::Record;
use serde::{Deserialize, Serialize};

/// A divergence between the local and remote versions of one logical record.
///
/// Both sides are captured in full, so the losing side's
/// `(text, category, version)` stays recoverable after the merge applied
/// the default resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub local: Record,
    pub remote: Record,
    /// Unix epoch milliseconds of detection.
    pub detected_at: i64,
}

impl Conflict {
    /// Local id of the record this conflict is about.
    pub fn record_id(&self) -> &str {
        self.local.id.as_str()
    }
}

/// Side picked by a human when overriding the default resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionChoice {
    Local,
    Remote,
}

impl ResolutionChoice {
    /// Parses `local` / `remote` (case-insensitive, trimmed).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Some(Self::Local),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}
