//! History durability: replay, torn tails, corruption and failed appends.

use columba_core::{ColumnType, Config, CoreError, Database, ErrorKind, ObjKey, Value, VersionId};
use columba_storage::InMemoryBackend;
use columba_testkit::crash::{commit_boundaries, expected_version, reopen_truncated, FaultyDatabase};
use columba_testkit::fixtures::{PersonSchema, TestDatabase};

fn build_history() -> Vec<u8> {
    let storage = InMemoryBackend::new();
    let db = Database::open_with_backend(Box::new(storage.share()), Config::default()).unwrap();
    let schema = PersonSchema::create(&db).unwrap();
    schema.populate(&db, 3).unwrap();
    db.write(|txn| {
        let t = txn.require_table(PersonSchema::TABLE)?;
        t.object(ObjKey::new(0))?.list_push(schema.friends, ObjKey::new(2))?;
        t.remove_object(ObjKey::new(1))
    })
    .unwrap();
    storage.data()
}

#[test]
fn every_truncation_recovers_a_commit_prefix() {
    let history = build_history();
    let boundaries = commit_boundaries(&history).unwrap();
    assert_eq!(boundaries.len(), 3);

    for cut in 0..=history.len() {
        let db = reopen_truncated(&history, cut).unwrap();
        assert_eq!(
            db.version(),
            expected_version(&boundaries, cut as u64),
            "cut at {cut}"
        );
    }
}

#[test]
fn replayed_state_matches_the_original() {
    let history = build_history();
    let db = reopen_truncated(&history, history.len()).unwrap();
    db.read(|txn| {
        let t = txn.require_table(PersonSchema::TABLE)?;
        assert_eq!(t.keys()?, vec![ObjKey::new(0), ObjKey::new(2)]);
        let friends = t.column_key("friends")?.unwrap();
        let name = t.column_key("name")?.unwrap();
        let p0 = t.object(ObjKey::new(0))?;
        assert_eq!(p0.list(friends)?, vec![Value::Link(ObjKey::new(2))]);
        assert_eq!(t.object(ObjKey::new(2))?.get(name)?, Value::from("p2"));
        Ok(())
    })
    .unwrap();
}

#[test]
fn checksum_corruption_fails_open_with_file_error() {
    let history = build_history();
    let boundaries = commit_boundaries(&history).unwrap();
    // flip a payload byte inside the second record
    let backend = InMemoryBackend::with_data(history);
    backend.corrupt_byte(boundaries[0] + 20).unwrap();
    let err = Database::open_with_backend(Box::new(backend), Config::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileError);
}

#[test]
fn damaged_length_in_early_record_fails_open() {
    let history = build_history();
    let backend = InMemoryBackend::with_data(history.clone());
    // payload length field of the first record
    backend.corrupt_byte(10).unwrap();
    let err =
        Database::open_with_backend(Box::new(backend.share()), Config::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileError);
    assert!(matches!(err, CoreError::HistoryCorruption { offset: 0, .. }));
    // nothing was truncated
    assert_eq!(backend.data().len(), history.len());
}

#[test]
fn open_writer_keeps_directory_locked() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("db");
    let db = Database::open(&path).unwrap();
    let mut txn = db.begin_write().unwrap();
    txn.add_table("t").unwrap();
    drop(db);

    let err = Database::open(&path).unwrap_err();
    assert!(matches!(err, CoreError::DatabaseLocked { .. }));

    assert_eq!(txn.commit().unwrap(), VersionId::new(1));
    drop(txn);
    let reopened = Database::open(&path).unwrap();
    assert_eq!(reopened.version(), VersionId::new(1));
    assert!(reopened.read(|txn| Ok(txn.has_table("t"))).unwrap());
}

#[test]
fn failed_append_rolls_back_and_leaves_no_trace() {
    let fdb = FaultyDatabase::new().unwrap();
    fdb.db
        .write(|txn| {
            let t = txn.add_table("t")?;
            t.add_column("n", ColumnType::Int, false)?;
            Ok(())
        })
        .unwrap();
    let committed = fdb.storage.data().len();

    fdb.switch.fail_appends_after(5);
    let mut txn = fdb.db.begin_write().unwrap();
    txn.require_table("t").unwrap().create_object().unwrap();
    let err = txn.commit().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileError);
    assert!(fdb.switch.tripped());
    drop(txn);

    assert_eq!(fdb.db.version(), VersionId::new(1));
    assert_eq!(fdb.storage.data().len(), committed);
    assert_eq!(fdb.db.read(|txn| txn.require_table("t")?.size()).unwrap(), 0);

    fdb.switch.heal();
    fdb.db
        .write(|txn| txn.require_table("t")?.create_object().map(drop))
        .unwrap();
    let recovered = fdb.recover().unwrap();
    assert_eq!(recovered.version(), VersionId::new(2));
    assert_eq!(recovered.read(|txn| txn.require_table("t")?.size()).unwrap(), 1);
}

#[test]
fn file_database_survives_reopen() {
    let db = TestDatabase::file();
    let schema = PersonSchema::create(&db).unwrap();
    schema.populate(&db, 5).unwrap();
    let version = db.version();

    let db = db.reopen();
    assert_eq!(db.version(), version);
    let size = db.read(|txn| txn.require_table(PersonSchema::TABLE)?.size()).unwrap();
    assert_eq!(size, 5);

    // keys keep counting after replay
    let key = db
        .write(|txn| Ok(txn.require_table(PersonSchema::TABLE)?.create_object()?.key()))
        .unwrap();
    assert_eq!(key, ObjKey::new(5));
}
