//! Merge and conflict detection between local and remote record sets.
//!
//! # Responsibility
//! - Compute the merged record set and the conflict list for one cycle.
//! - Decide which merged records still have to be pushed.
//!
//! # Invariants
//! - `merge` is pure: no I/O, no clock reads (detection time is an input).
//! - Output ids are unique; every input record maps to one output record
//!   and/or one conflict.
//! - An adopted side contributes text, category, version and timestamp together.
//! - `merge(S, S)` returns `S` unchanged with no conflicts.

use crate::model::conflict::Conflict;
use crate::model::record::{Record, RecordId};
use log::debug;
use std::collections::{HashMap, HashSet};

/// Result of merging one local snapshot with one remote fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Remote baseline order first, then local novelties in local order.
    pub merged: Vec<Record>,
    /// One entry per diverging pair, both sides captured.
    pub conflicts: Vec<Conflict>,
    /// Ids of merged records the remote side has not accepted yet.
    pub outgoing: Vec<RecordId>,
}

/// How one remote baseline slot ended up after matching.
enum Slot {
    Untouched,
    Matched(Record),
}

/// Merges `local` into the authoritative `remote` baseline.
///
/// Matching runs in three passes so that ids can never collide:
/// 1. local `id` equal to a remote `id`,
/// 2. local `remote_id` equal to a still unmatched remote `id`,
/// 3. `(text, category)` equal to a still unmatched remote record, for
///    locals that were never pushed.
///
/// Locals that match nothing are novelties and are kept unchanged.
pub fn merge(local: &[Record], remote: &[Record], detected_at: i64) -> MergeOutcome {
    let by_id: HashMap<&str, usize> = remote
        .iter()
        .enumerate()
        .map(|(index, record)| (record.id.as_str(), index))
        .collect();

    let mut slots: Vec<Slot> = remote.iter().map(|_| Slot::Untouched).collect();
    let mut local_matched = vec![false; local.len()];
    let mut conflicts = Vec::new();
    let mut fast_forwarded: HashSet<RecordId> = HashSet::new();

    // Pass 1: identical ids.
    for (local_index, record) in local.iter().enumerate() {
        if let Some(&remote_index) = by_id.get(record.id.as_str()) {
            slots[remote_index] = Slot::Matched(reconcile_pair(
                record,
                &remote[remote_index],
                detected_at,
                &mut conflicts,
                &mut fast_forwarded,
            ));
            local_matched[local_index] = true;
        }
    }

    // Pass 2: previously pushed records known under their server id.
    for (local_index, record) in local.iter().enumerate() {
        if local_matched[local_index] {
            continue;
        }
        let Some(remote_id) = record.remote_id.as_deref() else {
            continue;
        };
        let Some(&remote_index) = by_id.get(remote_id) else {
            continue;
        };
        if matches!(slots[remote_index], Slot::Matched(_)) {
            continue;
        }
        slots[remote_index] = Slot::Matched(reconcile_pair(
            record,
            &remote[remote_index],
            detected_at,
            &mut conflicts,
            &mut fast_forwarded,
        ));
        local_matched[local_index] = true;
    }

    // Pass 3: pushed successfully but the server id was never recorded.
    for (local_index, record) in local.iter().enumerate() {
        if local_matched[local_index] || !record.is_unpushed() {
            continue;
        }
        let candidate = remote.iter().enumerate().position(|(remote_index, other)| {
            matches!(slots[remote_index], Slot::Untouched) && other.same_payload_as(record)
        });
        if let Some(remote_index) = candidate {
            let linked = link_by_content(record, &remote[remote_index], &mut fast_forwarded);
            debug!(
                "event=merge module=sync status=content_match local_id={} remote_id={}",
                record.id, remote[remote_index].id
            );
            slots[remote_index] = Slot::Matched(linked);
            local_matched[local_index] = true;
        }
    }

    let mut merged: Vec<Record> = slots
        .into_iter()
        .zip(remote)
        .map(|(slot, baseline)| match slot {
            Slot::Matched(record) => record,
            Slot::Untouched => baseline.clone(),
        })
        .collect();
    merged.extend(
        local
            .iter()
            .zip(&local_matched)
            .filter(|(_, matched)| !**matched)
            .map(|(record, _)| record.clone()),
    );

    let outgoing = merged
        .iter()
        .filter(|record| record.is_unpushed() || fast_forwarded.contains(&record.id))
        .map(|record| record.id.clone())
        .collect();

    MergeOutcome {
        merged,
        conflicts,
        outgoing,
    }
}

/// Resolves one local/remote pair that share an identity.
fn reconcile_pair(
    local: &Record,
    remote: &Record,
    detected_at: i64,
    conflicts: &mut Vec<Conflict>,
    fast_forwarded: &mut HashSet<RecordId>,
) -> Record {
    let mut result = local.clone();
    if result.remote_id.is_none() {
        result.remote_id = remote.remote_id.clone();
    }

    if local.same_content_as(remote) {
        return result;
    }

    // A strictly newer local version is an accepted local mutation the
    // remote has not seen (e.g. a manual resolution), not a stale value.
    if local.version > remote.version {
        fast_forwarded.insert(local.id.clone());
        return result;
    }

    result.adopt_content_of(remote);
    conflicts.push(Conflict {
        local: local.clone(),
        remote: remote.clone(),
        detected_at,
    });
    result
}

/// Links a never-pushed local record to a remote record with equal payload.
fn link_by_content(
    local: &Record,
    remote: &Record,
    fast_forwarded: &mut HashSet<RecordId>,
) -> Record {
    let mut linked = local.clone();
    linked.remote_id = Some(
        remote
            .remote_id
            .clone()
            .unwrap_or_else(|| remote.id.clone()),
    );
    if remote.version >= local.version {
        linked.version = remote.version;
        linked.last_modified = remote.last_modified;
    } else {
        fast_forwarded.insert(local.id.clone());
    }
    linked
}
