//! Cross-thread visibility, invalidation and writer serialization.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use columba_core::{ColumnType, Database, ErrorKind, ObjKey, VersionId};
use columba_testkit::stress::{run_contended_writers, run_ledger_stress, StressConfig};

#[test]
fn delete_on_another_thread_invalidates_after_advance() {
    let db = Database::open_in_memory().unwrap();
    let (age, key) = db
        .write(|txn| {
            let t = txn.add_table("class_Person")?;
            let age = t.add_column("age", ColumnType::Int, false)?;
            let p = t.create_object()?;
            p.set(age, 30)?;
            Ok((age, p.key()))
        })
        .unwrap();

    let mut reader = db.begin_read();
    let person = reader.require_table("class_Person").unwrap().object(key).unwrap();
    assert_eq!(person.get_int(age).unwrap(), Some(30));

    let other = db.clone();
    thread::spawn(move || {
        other
            .write(|txn| txn.require_table("class_Person")?.remove_object(key))
            .unwrap();
    })
    .join()
    .unwrap();

    // still pinned to the old version
    assert!(person.is_valid());
    assert_eq!(person.get_int(age).unwrap(), Some(30));

    assert!(reader.advance());
    assert!(!person.is_valid());
    let err = person.get_int(age).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState);
    assert_eq!(
        err.to_string(),
        "Object is no longer valid to operate on. Was it deleted by another thread?"
    );

    // re-resolving in the new version finds nothing
    assert!(reader.import_object(&person).is_none());
    assert!(!reader.require_table("class_Person").unwrap().contains(key).unwrap());
}

#[test]
fn advance_invalidates_even_surviving_handles() {
    let db = Database::open_in_memory().unwrap();
    db.write(|txn| txn.add_table("t")?.create_object().map(drop)).unwrap();

    let mut reader = db.begin_read();
    let table = reader.require_table("t").unwrap();
    let obj = table.object(ObjKey::new(0)).unwrap();

    // advancing with nothing new keeps handles
    assert!(!reader.advance());
    assert!(table.is_valid());

    db.write(|txn| txn.require_table("t")?.create_object().map(drop)).unwrap();
    assert!(reader.advance());
    assert!(!table.is_valid());
    assert!(!obj.is_valid());
    assert_eq!(table.size().unwrap_err().kind(), ErrorKind::IllegalState);

    // handles can be re-imported when the entity survived
    let table = reader.import_table(&table).unwrap();
    assert_eq!(table.size().unwrap(), 2);
    assert!(reader.import_object(&obj).unwrap().is_valid());
}

#[test]
fn readers_keep_their_version_while_writer_commits() {
    let db = Database::open_in_memory().unwrap();
    db.write(|txn| txn.add_table("t").map(drop)).unwrap();
    let reader = db.begin_read();
    assert_eq!(reader.version(), VersionId::new(1));

    for _ in 0..5 {
        db.write(|txn| txn.require_table("t")?.create_object().map(drop)).unwrap();
    }
    assert_eq!(reader.require_table("t").unwrap().size().unwrap(), 0);
    assert_eq!(db.version(), VersionId::new(6));
    assert_eq!(db.oldest_pinned(), Some(VersionId::new(1)));

    drop(reader);
    assert_eq!(db.oldest_pinned(), None);
    assert_eq!(db.live_versions(), vec![VersionId::new(6)]);
    assert!(db.stats().versions_reclaimed >= 1);
}

#[test]
fn second_writer_waits_for_the_first() {
    let db = Database::open_in_memory().unwrap();
    let first = db.begin_write().unwrap();
    assert!(db.try_begin_write().is_none());

    let (tx, rx) = mpsc::channel();
    let other = db.clone();
    let waiter = thread::spawn(move || {
        let mut txn = other.begin_write().unwrap();
        tx.send(()).unwrap();
        txn.add_table("second").unwrap();
        txn.commit().unwrap()
    });

    // the waiter cannot get in while the first writer is open
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    first.add_table("first").unwrap();
    drop(first);

    rx.recv_timeout(Duration::from_secs(10)).unwrap();
    let version = waiter.join().unwrap();
    assert_eq!(version, VersionId::new(1));
    // the dropped first writer rolled back
    assert_eq!(db.read(|txn| Ok(txn.table_names())).unwrap(), vec!["second"]);
}

#[test]
fn handles_move_between_threads() {
    let db = Database::open_in_memory().unwrap();
    let age = db
        .write(|txn| {
            let t = txn.add_table("t")?;
            let age = t.add_column("age", ColumnType::Int, false)?;
            t.create_object()?.set(age, 7)?;
            Ok(age)
        })
        .unwrap();
    let reader = db.begin_read();
    let obj = reader.require_table("t").unwrap().object(ObjKey::new(0)).unwrap();
    let read = thread::spawn(move || obj.get_int(age)).join().unwrap();
    assert_eq!(read.unwrap(), Some(7));
}

#[test]
fn contended_writers_are_serialized() {
    let db = Database::open_in_memory().unwrap();
    let rows = run_contended_writers(&db, 4, 25).unwrap();
    assert_eq!(rows, 100);
    assert_eq!(db.version(), VersionId::new(101));
}

#[test]
fn ledger_invariant_holds_under_concurrent_readers() {
    let db = Database::open_in_memory().unwrap();
    let report = run_ledger_stress(&db, &StressConfig::default()).unwrap();
    assert!(report.violations.is_empty(), "{:?}", report.violations);
    assert_eq!(report.commits, StressConfig::default().commits);
}
