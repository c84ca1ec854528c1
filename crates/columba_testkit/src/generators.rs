//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use columba_core::{ColumnType, Timestamp, Value};
use proptest::prelude::*;

/// Strategy for valid table and column names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,31}").expect("Invalid regex")
}

/// Strategy for scalar (non-link) column types.
pub fn scalar_type_strategy() -> impl Strategy<Value = ColumnType> {
    prop::sample::select(vec![
        ColumnType::Int,
        ColumnType::Bool,
        ColumnType::String,
        ColumnType::Binary,
        ColumnType::Timestamp,
        ColumnType::Float,
        ColumnType::Double,
    ])
}

/// Strategy for whole-millisecond boundary timestamps.
pub fn milliseconds_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![
        -10_000_000_000_000i64..10_000_000_000_000,
        Just(0),
        Just(-1),
        Just(i64::MAX),
        Just(i64::MIN + 1000),
    ]
}

/// Strategy for non-null values of scalar type `ty`.
pub fn value_strategy(ty: ColumnType) -> BoxedStrategy<Value> {
    match ty {
        ColumnType::Int => any::<i64>().prop_map(Value::Int).boxed(),
        ColumnType::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
        ColumnType::String => ".{0,64}".prop_map(Value::String).boxed(),
        ColumnType::Binary => prop::collection::vec(any::<u8>(), 0..64)
            .prop_map(Value::Binary)
            .boxed(),
        ColumnType::Timestamp => milliseconds_strategy()
            .prop_map(|ms| Value::Timestamp(Timestamp::from_milliseconds(ms)))
            .boxed(),
        ColumnType::Float => (-1e6f32..1e6).prop_map(Value::Float).boxed(),
        ColumnType::Double => (-1e12f64..1e12).prop_map(Value::Double).boxed(),
        ColumnType::Link | ColumnType::LinkList => Just(Value::Null).boxed(),
    }
}

/// Strategy for a column type paired with a value of that type.
pub fn typed_value_strategy() -> impl Strategy<Value = (ColumnType, Value)> {
    scalar_type_strategy().prop_flat_map(|ty| (Just(ty), value_strategy(ty)))
}

/// One mutation of the model table.
///
/// Row selectors pick among the live rows in key order, wrapping around;
/// they are ignored when the table is empty.
#[derive(Debug, Clone)]
pub enum RowOp {
    /// Create a row.
    Create,
    /// Remove the selected row.
    Remove(usize),
    /// Set the int column of the selected row.
    SetInt(usize, i64),
    /// Set the nullable string column of the selected row.
    SetString(usize, Option<String>),
}

/// Strategy for a single row operation.
pub fn row_op_strategy() -> impl Strategy<Value = RowOp> {
    prop_oneof![
        3 => Just(RowOp::Create),
        1 => any::<usize>().prop_map(RowOp::Remove),
        2 => (any::<usize>(), any::<i64>()).prop_map(|(s, v)| RowOp::SetInt(s, v)),
        2 => (any::<usize>(), prop::option::of("[a-z]{0,12}"))
            .prop_map(|(s, v)| RowOp::SetString(s, v)),
    ]
}

/// A write transaction's worth of operations.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Operations in order.
    pub ops: Vec<RowOp>,
    /// Commit if true, roll back otherwise.
    pub commit: bool,
}

/// Strategy for a sequence of batches.
pub fn batches_strategy(max_batches: usize) -> impl Strategy<Value = Vec<Batch>> {
    prop::collection::vec(
        (
            prop::collection::vec(row_op_strategy(), 0..16),
            prop::bool::weighted(0.8),
        )
            .prop_map(|(ops, commit)| Batch { ops, commit }),
        1..max_batches,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::test_runner::TestRunner;

    #[test]
    fn values_match_their_type() {
        let mut runner = TestRunner::default();
        runner
            .run(&typed_value_strategy(), |(ty, value)| {
                prop_assert_eq!(value.column_type(), Some(ty));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn names_are_never_empty() {
        let mut runner = TestRunner::default();
        runner
            .run(&name_strategy(), |name| {
                prop_assert!(!name.is_empty());
                Ok(())
            })
            .unwrap();
    }
}
