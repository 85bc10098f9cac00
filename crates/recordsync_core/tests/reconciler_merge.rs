use recordsync_core::{merge, ConflictLedger, Origin, Record, ResolutionChoice};
use std::collections::{HashMap, HashSet};

fn local(id: &str, text: &str, category: &str, version: u32) -> Record {
    Record {
        id: id.to_string(),
        remote_id: None,
        text: text.to_string(),
        category: category.to_string(),
        version,
        last_modified: i64::from(version) * 10,
        origin: Origin::Local,
    }
}

fn remote(id: &str, text: &str, category: &str, version: u32) -> Record {
    Record::remote(id, text, category, version, i64::from(version) * 10)
}

/// A mixed set: unpushed locals, pushed locals and remote-materialized rows.
fn mixed_set() -> Vec<Record> {
    let mut pushed = local("p-1", "Pushed", "Sync", 4);
    pushed.remote_id = Some("r-9".to_string());
    vec![
        local("1", "Hello", "X", 1),
        pushed,
        remote("r-2", "Server", "Y", 2),
        local("3", "Draft", "Z", 1),
    ]
}

#[test]
fn merging_a_set_with_itself_changes_nothing() {
    for set in [Vec::new(), mixed_set(), vec![remote("r-1", "Solo", "A", 7)]] {
        let outcome = merge(&set, &set, 0);
        assert_eq!(outcome.merged, set);
        assert!(outcome.conflicts.is_empty());
    }
}

#[test]
fn diverging_pair_adopts_remote_and_captures_both_sides() {
    let outcome = merge(
        &[local("1", "A", "X", 1)],
        &[remote("1", "B", "X", 2)],
        42,
    );

    assert_eq!(outcome.merged.len(), 1);
    let merged = &outcome.merged[0];
    assert_eq!(merged.id, "1");
    assert_eq!(merged.text, "B");
    assert_eq!(merged.version, 2);

    assert_eq!(outcome.conflicts.len(), 1);
    let conflict = &outcome.conflicts[0];
    assert_eq!(conflict.record_id(), "1");
    assert_eq!(conflict.local.text, "A");
    assert_eq!(conflict.remote.text, "B");
    assert_eq!(conflict.detected_at, 42);
}

#[test]
fn local_addition_survives_next_to_remote_baseline() {
    let baseline = vec![remote("r-1", "Server", "X", 1)];
    let addition = Record::new_local("New", "Y");

    let outcome = merge(&[addition.clone()], &baseline, 0);

    assert_eq!(outcome.merged, vec![baseline[0].clone(), addition.clone()]);
    assert!(outcome.conflicts.is_empty());
    assert_eq!(outcome.outgoing, vec![addition.id]);
}

#[test]
fn losing_side_stays_retrievable_for_every_conflict() {
    let locals = vec![
        local("1", "Mine", "X", 1),
        local("2", "Ours", "Y", 2),
        local("3", "Same", "Z", 1),
    ];
    let remotes = vec![
        remote("1", "Theirs", "X", 2),
        remote("2", "Ours", "Moved", 2),
        remote("3", "Same", "Z", 1),
    ];

    let outcome = merge(&locals, &remotes, 0);
    assert_eq!(outcome.conflicts.len(), 2);

    for conflict in &outcome.conflicts {
        let original = locals
            .iter()
            .find(|record| record.id == conflict.record_id())
            .expect("conflict points at a local record");
        assert_eq!(conflict.local.text, original.text);
        assert_eq!(conflict.local.category, original.category);
        assert_eq!(conflict.local.version, original.version);
    }
}

#[test]
fn merged_ids_are_unique_and_every_input_is_accounted_for() {
    let mut linked = local("a", "Linked", "X", 1);
    linked.remote_id = Some("r-1".to_string());
    let locals = vec![
        linked,
        local("b", "Twin", "T", 1),
        local("c", "Twin", "T", 1),
        local("r-3", "Clash", "Q", 1),
    ];
    let remotes = vec![
        remote("r-1", "Linked", "X", 1),
        remote("r-2", "Twin", "T", 1),
        remote("r-3", "Other", "Q", 2),
    ];

    let outcome = merge(&locals, &remotes, 0);

    let ids: Vec<&str> = outcome.merged.iter().map(|record| record.id.as_str()).collect();
    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len(), "duplicate ids in {ids:?}");

    let conflict_ids: HashSet<&str> = outcome.conflicts.iter().map(|c| c.record_id()).collect();
    for record in &locals {
        assert!(
            unique.contains(record.id.as_str()) || conflict_ids.contains(record.id.as_str()),
            "local {} lost",
            record.id
        );
    }
    for record in &remotes {
        let represented = outcome.merged.iter().any(|merged| {
            merged.id == record.id || merged.remote_id.as_deref() == Some(record.id.as_str())
        });
        assert!(represented, "remote {} lost", record.id);
    }
}

#[test]
fn versions_never_decrease_across_merges_and_resolutions() {
    let mut records = vec![local("1", "A", "X", 1), local("2", "B", "Y", 3)];
    let mut ledger = ConflictLedger::new();
    let mut seen: HashMap<String, u32> = HashMap::new();
    let mut check = |records: &[Record]| {
        for record in records {
            let previous = seen.insert(record.id.clone(), record.version).unwrap_or(0);
            assert!(
                record.version >= previous,
                "{} went from v{previous} to v{}",
                record.id,
                record.version
            );
        }
    };
    check(&records);

    let rounds = [
        vec![remote("1", "A2", "X", 2), remote("2", "B", "Y", 1)],
        vec![remote("1", "A3", "X", 2), remote("2", "B-old", "Y", 2)],
        vec![remote("1", "A4", "X", 5), remote("2", "B", "Y", 3)],
    ];
    for (round, fetched) in rounds.iter().enumerate() {
        let outcome = merge(&records, fetched, round as i64);
        records = outcome.merged;
        check(&records);

        ledger.record(outcome.conflicts);
        while !ledger.is_empty() {
            let choice = if round % 2 == 0 {
                ResolutionChoice::Local
            } else {
                ResolutionChoice::Remote
            };
            ledger.resolve(0, choice, &mut records, 1_000).unwrap();
            check(&records);
        }
    }
}

#[test]
fn first_content_match_wins_and_later_twins_stay_novelties() {
    let first = local("b", "Twin", "T", 1);
    let second = local("c", "Twin", "T", 1);
    let baseline = vec![remote("r-2", "Twin", "T", 1)];

    let outcome = merge(&[first.clone(), second.clone()], &baseline, 0);

    assert_eq!(outcome.merged.len(), 2);
    assert_eq!(outcome.merged[0].id, first.id);
    assert_eq!(outcome.merged[0].remote_id.as_deref(), Some("r-2"));
    assert_eq!(outcome.merged[1], second);
    assert!(outcome.conflicts.is_empty());
}
