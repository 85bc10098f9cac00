//! Versioned record model shared by stores, reconciler and engine.
//!
//! # Responsibility
//! - Define the canonical `Record` and `Conflict` shapes.
//! - Reject malformed records before they reach the merge algorithm.
//!
//! # Invariants
//! - Every record is identified by a stable, non-blank `RecordId`.
//! - `(text, category, version)` travels together; nothing in core splits it.
//! - Records are never deleted; the model has no tombstone state.

pub mod conflict;
pub mod record;
