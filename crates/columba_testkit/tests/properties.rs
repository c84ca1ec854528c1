//! Property tests against the reference model.

use columba_core::{ColumnType, Config, Database, Timestamp, Value};
use columba_storage::InMemoryBackend;
use columba_testkit::{
    batches_strategy, milliseconds_strategy, typed_value_strategy, Model, ModelTable,
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn committed_state_matches_model(batches in batches_strategy(12)) {
        let db = Database::open_in_memory().unwrap();
        let table = ModelTable::create(&db).unwrap();
        let mut model = Model::default();
        for batch in &batches {
            table.apply_batch(&db, batch).unwrap();
            model.apply_batch(batch);
            let rows = db.read(|txn| table.read(txn)).unwrap();
            prop_assert_eq!(&rows, model.rows());
        }
    }

    #[test]
    fn replay_reproduces_committed_state(batches in batches_strategy(8)) {
        let storage = InMemoryBackend::new();
        let db = Database::open_with_backend(Box::new(storage.share()), Config::default()).unwrap();
        let table = ModelTable::create(&db).unwrap();
        for batch in &batches {
            table.apply_batch(&db, batch).unwrap();
        }
        let expected = db.read(|txn| table.read(txn)).unwrap();
        let version = db.version();
        drop(db);

        let reopened =
            Database::open_with_backend(Box::new(storage.share()), Config::default()).unwrap();
        prop_assert_eq!(reopened.version(), version);
        let rows = reopened.read(|txn| table.read(txn)).unwrap();
        prop_assert_eq!(rows, expected);
    }

    #[test]
    fn whole_milliseconds_round_trip(ms in milliseconds_strategy()) {
        let ts = Timestamp::from_milliseconds(ms);
        prop_assert_eq!(ts.to_milliseconds(), ms);
        prop_assert!(ts.nanoseconds().unsigned_abs() < 1_000_000_000);
        prop_assert!(ts.seconds() == 0 || ts.nanoseconds() == 0
            || (ts.seconds() < 0) == (ts.nanoseconds() < 0));
    }

    #[test]
    fn type_valid_only_for_declared_type(
        (ty, value) in typed_value_strategy(),
        other in 0usize..7,
    ) {
        let db = Database::open_in_memory().unwrap();
        let mut txn = db.begin_write().unwrap();
        let t = txn.add_table("t").unwrap();
        let col = t.add_column("c", ty, true).unwrap();
        let obj = t.create_object().unwrap();
        obj.set(col, value.clone()).unwrap();
        prop_assert_eq!(obj.get(col).unwrap(), value);

        prop_assert!(t.type_valid(col, ty).unwrap());
        let scalars = [
            ColumnType::Int,
            ColumnType::Bool,
            ColumnType::String,
            ColumnType::Binary,
            ColumnType::Timestamp,
            ColumnType::Float,
            ColumnType::Double,
        ];
        let candidate = scalars[other];
        prop_assert_eq!(t.type_valid(col, candidate).is_ok(), candidate == ty);
        txn.rollback().unwrap();
    }

    #[test]
    fn mismatched_values_are_rejected_without_effect((ty, value) in typed_value_strategy()) {
        let db = Database::open_in_memory().unwrap();
        let mut txn = db.begin_write().unwrap();
        let t = txn.add_table("t").unwrap();
        let target = if ty == ColumnType::Int { ColumnType::Bool } else { ColumnType::Int };
        let col = t.add_column("c", target, false).unwrap();
        let obj = t.create_object().unwrap();
        let before = obj.get(col).unwrap();
        prop_assert!(obj.set(col, value).is_err());
        prop_assert_eq!(obj.get(col).unwrap(), before);
        prop_assert!(obj.set(col, Value::Null).is_err());
        txn.rollback().unwrap();
    }
}
