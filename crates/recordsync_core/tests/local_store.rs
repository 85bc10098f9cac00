use recordsync_core::{LocalStore, Origin, Record, SqliteLocalStore, StoreError};

fn sample_records() -> Vec<Record> {
    let mut pushed = Record::remote("r-7", "Quote", "Wisdom", 3, 1_700);
    pushed.origin = Origin::Local;
    vec![
        Record::new_local("Zeta", "Last"),
        pushed,
        Record::new_local("Alpha", "First"),
    ]
}

#[test]
fn save_then_load_preserves_records_and_order() {
    let mut store = SqliteLocalStore::in_memory().unwrap();
    let records = sample_records();

    store.save(&records).unwrap();

    assert_eq!(store.load().unwrap(), records);
}

#[test]
fn save_replaces_the_previous_set() {
    let mut store = SqliteLocalStore::in_memory().unwrap();
    store.save(&sample_records()).unwrap();

    let smaller = vec![Record::new_local("Only", "One")];
    store.save(&smaller).unwrap();

    assert_eq!(store.load().unwrap(), smaller);
}

#[test]
fn empty_store_loads_empty_set() {
    let store = SqliteLocalStore::in_memory().unwrap();
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn records_survive_reopening_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.db");
    let records = sample_records();

    let mut first = SqliteLocalStore::open(&path).unwrap();
    first.save(&records).unwrap();
    drop(first);

    let second = SqliteLocalStore::open(&path).unwrap();
    assert_eq!(second.load().unwrap(), records);
}

#[test]
fn unknown_origin_is_reported_as_corrupt_data() {
    let store = SqliteLocalStore::in_memory().unwrap();
    store
        .connection()
        .execute(
            "INSERT INTO records (id, remote_id, text, category, version, last_modified, origin, position)
             VALUES ('x', NULL, 'Hello', 'X', 1, 0, 'bogus', 0);",
            [],
        )
        .unwrap();

    match store.load() {
        Err(StoreError::CorruptData(message)) => assert!(message.contains("origin")),
        other => panic!("expected corrupt data, got {other:?}"),
    }
}

#[test]
fn blank_text_row_is_reported_as_corrupt_data() {
    let store = SqliteLocalStore::in_memory().unwrap();
    store
        .connection()
        .execute(
            "INSERT INTO records (id, remote_id, text, category, version, last_modified, origin, position)
             VALUES ('x', NULL, '   ', 'X', 1, 0, 'local', 0);",
            [],
        )
        .unwrap();

    assert!(matches!(store.load(), Err(StoreError::CorruptData(_))));
}

#[test]
fn negative_version_is_reported_as_corrupt_data() {
    let store = SqliteLocalStore::in_memory().unwrap();
    store
        .connection()
        .execute(
            "INSERT INTO records (id, remote_id, text, category, version, last_modified, origin, position)
             VALUES ('x', NULL, 'Hello', 'X', -4, 0, 'local', 0);",
            [],
        )
        .unwrap();

    assert!(matches!(store.load(), Err(StoreError::CorruptData(_))));
}

#[test]
fn invalid_record_is_rejected_and_previous_set_kept() {
    let mut store = SqliteLocalStore::in_memory().unwrap();
    let records = sample_records();
    store.save(&records).unwrap();

    let mut broken = Record::new_local("Fine", "Cat");
    broken.category = String::new();
    let err = store.save(&[broken]).unwrap_err();

    assert!(matches!(err, StoreError::Rejected(_)));
    assert_eq!(store.load().unwrap(), records);
}
