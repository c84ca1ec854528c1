//! Parameter checks run before a boundary call touches the engine.

use columba_core::{ColKey, ColumnType, CoreError, Obj, TableRef};
use tracing::error;

use crate::error::FfiResult;

/// Fails with `IllegalState` if the table handle is detached.
pub fn table_is_valid(table: &TableRef) -> FfiResult<()> {
    if table.is_valid() {
        return Ok(());
    }
    error!("Table is no longer attached!");
    Err(CoreError::table_invalid().into())
}

/// Fails with `IllegalState` if the object handle is detached or deleted.
pub fn row_is_valid(obj: &Obj) -> FfiResult<()> {
    if obj.is_valid() {
        return Ok(());
    }
    error!("Row {} is no longer attached!", obj.key());
    Err(CoreError::object_invalid().into())
}

/// Fails with `IllegalArgument` unless `col` has exactly type `expected`.
pub fn type_valid(table: &TableRef, col: ColKey, expected: ColumnType) -> FfiResult<()> {
    table.type_valid(col, expected)?;
    Ok(())
}

/// Fails with `IllegalArgument` unless `col` may be set to null.
pub fn col_is_nullable(table: &TableRef, col: ColKey) -> FfiResult<()> {
    table.column_nullable(col)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use columba_core::{Database, ErrorKind};

    #[test]
    fn checks_follow_column_declarations() {
        let db = Database::open_in_memory().unwrap();
        let txn = db.begin_write().unwrap();
        let t = txn.add_table("t").unwrap();
        let age = t.add_column("age", ColumnType::Int, false).unwrap();
        let nick = t.add_column("nick", ColumnType::String, true).unwrap();
        let tags = t.add_list_column("tags", ColumnType::String, true).unwrap();
        let friend = t.add_link_column("friend", &t).unwrap();

        table_is_valid(&t).unwrap();
        type_valid(&t, age, ColumnType::Int).unwrap();
        let err = type_valid(&t, age, ColumnType::Double).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalArgument);
        assert_eq!(err.to_string(), "ColumnType of 'age' is invalid.");

        col_is_nullable(&t, nick).unwrap();
        col_is_nullable(&t, friend).unwrap();
        assert_eq!(
            col_is_nullable(&t, age).unwrap_err().to_string(),
            "This field(age) is not nullable."
        );
        assert_eq!(
            col_is_nullable(&t, tags).unwrap_err().to_string(),
            "List(tags) is not nullable."
        );
    }

    #[test]
    fn detached_handles_fail_with_illegal_state() {
        let db = Database::open_in_memory().unwrap();
        let mut txn = db.begin_write().unwrap();
        let t = txn.add_table("t").unwrap();
        let obj = t.create_object().unwrap();
        row_is_valid(&obj).unwrap();
        obj.remove().unwrap();

        let err = row_is_valid(&obj).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert_eq!(
            err.to_string(),
            "Object is no longer valid to operate on. Was it deleted by another thread?"
        );

        txn.commit().unwrap();
        let err = table_is_valid(&t).unwrap_err();
        assert_eq!(err.to_string(), "Table is no longer valid to operate on.");
    }
}
