//! Integer-handle API over a [`Database`].
//!
//! Every transaction, table and object the caller holds is an `i64`
//! handle into one of three arenas. Table and object handles stay in the
//! arena after their transaction ends; the engine reports them invalid
//! and the caller releases them when done.

use columba_core::{
    ColKey, ColumnType, Config, CoreError, Database, Obj, ObjKey, OrNotFound, ReadTransaction,
    TableRef, Transaction, Value, WriteTransaction, NOT_FOUND,
};
use parking_lot::Mutex;
use tracing::debug;

use crate::checks::{col_is_nullable, row_is_valid, table_is_valid, type_valid};
use crate::error::{FfiError, FfiResult};
use crate::handles::{Handle, HandleArena};
use crate::marshal::{from_milliseconds, to_milliseconds, StringAccessor};

enum Txn {
    Read(ReadTransaction),
    Write(WriteTransaction),
}

impl Txn {
    fn base(&self) -> &Transaction {
        match self {
            Self::Read(txn) => &**txn,
            Self::Write(txn) => &**txn,
        }
    }
}

#[derive(Default)]
struct Handles {
    transactions: HandleArena<Txn>,
    tables: HandleArena<TableRef>,
    objects: HandleArena<Obj>,
}

fn stale(what: &'static str, handle: i64) -> FfiError {
    FfiError::StaleHandle { what, handle }
}

/// A database plus the handles a binding holds into it.
pub struct Session {
    db: Database,
    handles: Mutex<Handles>,
}

impl Session {
    /// Wraps an open database.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            handles: Mutex::new(Handles::default()),
        }
    }

    /// Opens a session over a fresh in-memory database.
    pub fn open_in_memory(config: Config) -> FfiResult<Self> {
        Ok(Self::new(Database::in_memory_with_config(config)?))
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    fn max_string_size(&self) -> usize {
        self.db.config().max_string_size
    }

    // === Transactions ===

    /// Starts a read transaction.
    pub fn begin_read(&self) -> FfiResult<i64> {
        let txn = self.db.begin_read();
        Ok(self.handles.lock().transactions.insert(Txn::Read(txn)).raw())
    }

    /// Starts the write transaction, waiting for the current writer.
    pub fn begin_write(&self) -> FfiResult<i64> {
        // wait for the writer slot before taking the arena lock
        let txn = self.db.begin_write()?;
        Ok(self.handles.lock().transactions.insert(Txn::Write(txn)).raw())
    }

    /// Starts the write transaction if no other writer is active.
    pub fn try_begin_write(&self) -> FfiResult<Option<i64>> {
        Ok(self
            .db
            .try_begin_write()
            .map(|txn| self.handles.lock().transactions.insert(Txn::Write(txn)).raw()))
    }

    fn take_write(&self, txn: i64) -> FfiResult<WriteTransaction> {
        let mut handles = self.handles.lock();
        let handle = Handle::from_raw(txn);
        match handles.transactions.get(handle) {
            Some(Txn::Write(_)) => {}
            Some(Txn::Read(_)) => {
                return Err(FfiError::WrongTransaction {
                    handle: txn,
                    expected: "write",
                })
            }
            None => return Err(stale("transaction", txn)),
        }
        match handles.transactions.remove(handle) {
            Some(Txn::Write(write)) => Ok(write),
            _ => Err(stale("transaction", txn)),
        }
    }

    /// Commits a write transaction and releases its handle.
    pub fn commit(&self, txn: i64) -> FfiResult<u64> {
        let mut write = self.take_write(txn)?;
        let version = write.commit()?;
        debug!(txn, %version, "boundary commit");
        Ok(version.as_u64())
    }

    /// Rolls back a write transaction and releases its handle.
    pub fn rollback(&self, txn: i64) -> FfiResult<()> {
        let mut write = self.take_write(txn)?;
        write.rollback()?;
        Ok(())
    }

    /// Ends a transaction of either kind; an active write is rolled back.
    pub fn close(&self, txn: i64) -> FfiResult<()> {
        let removed = self.handles.lock().transactions.remove(Handle::from_raw(txn));
        removed.map(drop).ok_or_else(|| stale("transaction", txn))
    }

    /// Moves a read transaction to the latest version.
    pub fn advance(&self, txn: i64) -> FfiResult<bool> {
        let mut handles = self.handles.lock();
        match handles.transactions.get_mut(Handle::from_raw(txn)) {
            Some(Txn::Read(read)) => Ok(read.advance()),
            Some(Txn::Write(_)) => Err(FfiError::WrongTransaction {
                handle: txn,
                expected: "read",
            }),
            None => Err(stale("transaction", txn)),
        }
    }

    /// Version a transaction is looking at.
    pub fn transaction_version(&self, txn: i64) -> FfiResult<u64> {
        self.with_txn(txn, |t| Ok(t.base().version().as_u64()))
    }

    /// Number of live transaction handles.
    pub fn open_transactions(&self) -> usize {
        self.handles.lock().transactions.len()
    }

    fn with_txn<R>(&self, txn: i64, f: impl FnOnce(&Txn) -> FfiResult<R>) -> FfiResult<R> {
        let handles = self.handles.lock();
        let t = handles
            .transactions
            .get(Handle::from_raw(txn))
            .ok_or_else(|| stale("transaction", txn))?;
        f(t)
    }

    // === Tables ===

    fn table_ref(&self, table: i64) -> FfiResult<TableRef> {
        self.handles
            .lock()
            .tables
            .get(Handle::from_raw(table))
            .cloned()
            .ok_or_else(|| stale("table", table))
    }

    fn live_table(&self, table: i64) -> FfiResult<TableRef> {
        let table = self.table_ref(table)?;
        table_is_valid(&table)?;
        Ok(table)
    }

    fn put_table(&self, table: TableRef) -> i64 {
        self.handles.lock().tables.insert(table).raw()
    }

    /// Handle to table `name`, or `NOT_FOUND`.
    pub fn table(&self, txn: i64, name: &str) -> FfiResult<i64> {
        let table = self.with_txn(txn, |t| Ok(t.base().table(name)))?;
        Ok(table.map_or(NOT_FOUND, |t| self.put_table(t)))
    }

    /// Adds table `name` in a write transaction.
    pub fn add_table(&self, txn: i64, name: &str) -> FfiResult<i64> {
        let table = self.with_txn(txn, |t| match t {
            Txn::Write(write) => Ok(write.add_table(name)?),
            Txn::Read(_) => Err(FfiError::WrongTransaction {
                handle: txn,
                expected: "write",
            }),
        })?;
        Ok(self.put_table(table))
    }

    /// Table names visible to the transaction.
    pub fn table_names(&self, txn: i64) -> FfiResult<Vec<String>> {
        self.with_txn(txn, |t| Ok(t.base().table_names()))
    }

    /// Whether the table handle is live and attached.
    pub fn table_is_valid(&self, table: i64) -> bool {
        self.table_ref(table).is_ok_and(|t| t.is_valid())
    }

    /// Table name.
    pub fn table_name(&self, table: i64) -> FfiResult<String> {
        Ok(self.live_table(table)?.name()?)
    }

    /// Number of objects in the table.
    pub fn table_size(&self, table: i64) -> FfiResult<i64> {
        let size = self.live_table(table)?.size()?;
        Ok(Some(size).or_not_found())
    }

    /// Releases a table handle.
    pub fn release_table(&self, table: i64) -> FfiResult<()> {
        let removed = self.handles.lock().tables.remove(Handle::from_raw(table));
        removed.map(drop).ok_or_else(|| stale("table", table))
    }

    // === Columns ===

    /// Adds a scalar column; `type_code` is a [`ColumnType`] code.
    pub fn add_column(
        &self,
        table: i64,
        name: &str,
        type_code: i32,
        nullable: bool,
    ) -> FfiResult<i64> {
        let ty = ColumnType::from_code(type_code).ok_or(FfiError::UnknownCode {
            what: "column type",
            code: type_code,
        })?;
        Ok(self.live_table(table)?.add_column(name, ty, nullable)?.value())
    }

    /// Adds a link column pointing at `target`.
    pub fn add_link_column(&self, table: i64, name: &str, target: i64) -> FfiResult<i64> {
        let target = self.live_table(target)?;
        Ok(self.live_table(table)?.add_link_column(name, &target)?.value())
    }

    /// Column key by name, or `NOT_FOUND`.
    pub fn column_key(&self, table: i64, name: &str) -> FfiResult<i64> {
        Ok(self.live_table(table)?.column_key(name)?.or_not_found())
    }

    /// Type code of a column.
    pub fn column_type(&self, table: i64, col: i64) -> FfiResult<i32> {
        Ok(self.live_table(table)?.column_type(ColKey::new(col))?.code())
    }

    /// Name of a column.
    pub fn column_name(&self, table: i64, col: i64) -> FfiResult<String> {
        Ok(self.live_table(table)?.column_name(ColKey::new(col))?)
    }

    // === Objects ===

    fn obj(&self, obj: i64) -> FfiResult<Obj> {
        self.handles
            .lock()
            .objects
            .get(Handle::from_raw(obj))
            .cloned()
            .ok_or_else(|| stale("object", obj))
    }

    fn live_obj(&self, obj: i64) -> FfiResult<Obj> {
        let obj = self.obj(obj)?;
        row_is_valid(&obj)?;
        Ok(obj)
    }

    /// Validates the row and the column type before a typed access.
    fn typed(&self, obj: i64, col: i64, ty: ColumnType) -> FfiResult<(Obj, ColKey)> {
        let obj = self.live_obj(obj)?;
        let col = ColKey::new(col);
        type_valid(&obj.table(), col, ty)?;
        Ok((obj, col))
    }

    fn put_obj(&self, obj: Obj) -> i64 {
        self.handles.lock().objects.insert(obj).raw()
    }

    /// Creates an object and returns its handle.
    pub fn create_object(&self, table: i64) -> FfiResult<i64> {
        let obj = self.live_table(table)?.create_object()?;
        Ok(self.put_obj(obj))
    }

    /// Handle to the object with `key`.
    pub fn object(&self, table: i64, key: i64) -> FfiResult<i64> {
        let key = ObjKey::from_raw(key)
            .ok_or_else(|| CoreError::illegal_argument(format!("Invalid object key {key}.")))?;
        let obj = self.live_table(table)?.object(key)?;
        Ok(self.put_obj(obj))
    }

    /// Key of the first object whose int column equals `value`, or `NOT_FOUND`.
    pub fn find_first_int(&self, table: i64, col: i64, value: i64) -> FfiResult<i64> {
        let table = self.live_table(table)?;
        let col = ColKey::new(col);
        type_valid(&table, col, ColumnType::Int)?;
        Ok(table.find_first(col, value)?.or_not_found())
    }

    /// Object key behind an object handle.
    pub fn object_key(&self, obj: i64) -> FfiResult<i64> {
        Ok(self.obj(obj)?.key().value())
    }

    /// Whether the object handle is live and its row exists.
    pub fn object_is_valid(&self, obj: i64) -> bool {
        self.obj(obj).is_ok_and(|o| o.is_valid())
    }

    /// Deletes the object's row.
    pub fn remove_object(&self, obj: i64) -> FfiResult<()> {
        Ok(self.live_obj(obj)?.remove()?)
    }

    /// Releases an object handle.
    pub fn release_object(&self, obj: i64) -> FfiResult<()> {
        let removed = self.handles.lock().objects.remove(Handle::from_raw(obj));
        removed.map(drop).ok_or_else(|| stale("object", obj))
    }

    /// Drops table and object handles whose entity is gone.
    pub fn release_detached(&self) -> usize {
        let mut handles = self.handles.lock();
        let before = handles.tables.len() + handles.objects.len();
        handles.tables.retain(TableRef::is_valid);
        handles.objects.retain(Obj::is_valid);
        before - handles.tables.len() - handles.objects.len()
    }

    // === Typed access ===
    //
    // Getters return the type's default for a null cell; callers that
    // care ask `is_null` first.

    /// Whether the cell is null.
    pub fn is_null(&self, obj: i64, col: i64) -> FfiResult<bool> {
        Ok(self.live_obj(obj)?.is_null(ColKey::new(col))?)
    }

    /// Reads an int cell.
    pub fn get_int(&self, obj: i64, col: i64) -> FfiResult<i64> {
        let (obj, col) = self.typed(obj, col, ColumnType::Int)?;
        Ok(obj.get_int(col)?.unwrap_or_default())
    }

    /// Reads a bool cell.
    pub fn get_bool(&self, obj: i64, col: i64) -> FfiResult<bool> {
        let (obj, col) = self.typed(obj, col, ColumnType::Bool)?;
        Ok(obj.get_bool(col)?.unwrap_or_default())
    }

    /// Reads a double cell.
    pub fn get_double(&self, obj: i64, col: i64) -> FfiResult<f64> {
        let (obj, col) = self.typed(obj, col, ColumnType::Double)?;
        Ok(obj.get_double(col)?.unwrap_or_default())
    }

    /// Reads a string cell; null stays `None`.
    pub fn get_string(&self, obj: i64, col: i64) -> FfiResult<Option<String>> {
        let (obj, col) = self.typed(obj, col, ColumnType::String)?;
        Ok(obj.get_string(col)?)
    }

    /// Reads a timestamp cell as milliseconds.
    pub fn get_timestamp(&self, obj: i64, col: i64) -> FfiResult<i64> {
        let (obj, col) = self.typed(obj, col, ColumnType::Timestamp)?;
        Ok(obj.get_timestamp(col)?.map_or(0, to_milliseconds))
    }

    /// Reads a link cell as a new object handle, or `NOT_FOUND`.
    pub fn get_link(&self, obj: i64, col: i64) -> FfiResult<i64> {
        let (obj, col) = self.typed(obj, col, ColumnType::Link)?;
        Ok(obj.get_link(col)?.map_or(NOT_FOUND, |target| self.put_obj(target)))
    }

    /// Writes an int cell.
    pub fn set_int(&self, obj: i64, col: i64, value: i64) -> FfiResult<()> {
        let (obj, col) = self.typed(obj, col, ColumnType::Int)?;
        Ok(obj.set(col, value)?)
    }

    /// Writes a bool cell.
    pub fn set_bool(&self, obj: i64, col: i64, value: bool) -> FfiResult<()> {
        let (obj, col) = self.typed(obj, col, ColumnType::Bool)?;
        Ok(obj.set(col, value)?)
    }

    /// Writes a double cell.
    pub fn set_double(&self, obj: i64, col: i64, value: f64) -> FfiResult<()> {
        let (obj, col) = self.typed(obj, col, ColumnType::Double)?;
        Ok(obj.set(col, value)?)
    }

    /// Writes a string cell; a null accessor writes null.
    pub fn set_string(&self, obj: i64, col: i64, value: StringAccessor<'_>) -> FfiResult<()> {
        let (obj, col) = self.typed(obj, col, ColumnType::String)?;
        if value.is_null() {
            col_is_nullable(&obj.table(), col)?;
        }
        let value = value.to_value(self.max_string_size())?;
        Ok(obj.set(col, value)?)
    }

    /// Writes a timestamp cell from milliseconds.
    pub fn set_timestamp(&self, obj: i64, col: i64, milliseconds: i64) -> FfiResult<()> {
        let (obj, col) = self.typed(obj, col, ColumnType::Timestamp)?;
        Ok(obj.set(col, from_milliseconds(milliseconds))?)
    }

    /// Writes a link cell; `NOT_FOUND` clears it.
    pub fn set_link(&self, obj: i64, col: i64, target_key: i64) -> FfiResult<()> {
        let (obj, col) = self.typed(obj, col, ColumnType::Link)?;
        let value = ObjKey::from_raw(target_key).map_or(Value::Null, Value::Link);
        Ok(obj.set(col, value)?)
    }

    /// Writes null.
    pub fn set_null(&self, obj: i64, col: i64) -> FfiResult<()> {
        let obj = self.live_obj(obj)?;
        let col = ColKey::new(col);
        col_is_nullable(&obj.table(), col)?;
        Ok(obj.set_null(col)?)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handles = self.handles.lock();
        f.debug_struct("Session")
            .field("database", &self.db)
            .field("transactions", &handles.transactions.len())
            .field("tables", &handles.tables.len())
            .field("objects", &handles.objects.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use columba_core::ErrorKind;

    fn session() -> Session {
        Session::open_in_memory(Config::default()).unwrap()
    }

    #[test]
    fn write_commit_read() {
        let s = session();
        let w = s.begin_write().unwrap();
        let t = s.add_table(w, "class_Person").unwrap();
        let age = s.add_column(t, "age", ColumnType::Int.code(), false).unwrap();
        let o = s.create_object(t).unwrap();
        s.set_int(o, age, 42).unwrap();
        assert_eq!(s.commit(w).unwrap(), 1);
        assert!(!s.table_is_valid(t));

        let r = s.begin_read().unwrap();
        let t = s.table(r, "class_Person").unwrap();
        assert_ne!(t, NOT_FOUND);
        assert_eq!(s.table(r, "class_Dog").unwrap(), NOT_FOUND);
        let age = s.column_key(t, "age").unwrap();
        assert_eq!(s.column_key(t, "weight").unwrap(), NOT_FOUND);
        assert_eq!(s.column_type(t, age).unwrap(), ColumnType::Int.code());
        assert_eq!(s.find_first_int(t, age, 42).unwrap(), 0);
        assert_eq!(s.find_first_int(t, age, 7).unwrap(), NOT_FOUND);
        let o = s.object(t, 0).unwrap();
        assert_eq!(s.get_int(o, age).unwrap(), 42);
        assert_eq!(s.table_size(t).unwrap(), 1);
        s.close(r).unwrap();
    }

    #[test]
    fn writes_need_a_write_transaction() {
        let s = session();
        let r = s.begin_read().unwrap();
        let err = s.add_table(r, "t").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert!(matches!(s.commit(r), Err(FfiError::WrongTransaction { .. })));
        let w = s.begin_write().unwrap();
        assert!(matches!(s.advance(w), Err(FfiError::WrongTransaction { .. })));
        s.rollback(w).unwrap();
    }

    #[test]
    fn stale_handles() {
        let s = session();
        let w = s.begin_write().unwrap();
        s.rollback(w).unwrap();
        let err = s.rollback(w).unwrap_err();
        assert!(matches!(err, FfiError::StaleHandle { what: "transaction", .. }));
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert!(!s.table_is_valid(12345));
        assert!(!s.object_is_valid(-1));
    }

    #[test]
    fn typed_access_checks_column_type() {
        let s = session();
        let w = s.begin_write().unwrap();
        let t = s.add_table(w, "t").unwrap();
        let name = s.add_column(t, "name", ColumnType::String.code(), true).unwrap();
        let at = s.add_column(t, "at", ColumnType::Timestamp.code(), false).unwrap();
        let o = s.create_object(t).unwrap();

        let err = s.set_int(o, name, 1).unwrap_err();
        assert_eq!(err.to_string(), "ColumnType of 'name' is invalid.");

        s.set_string(o, name, StringAccessor::new(Some(b"ada"))).unwrap();
        assert_eq!(s.get_string(o, name).unwrap().as_deref(), Some("ada"));
        s.set_string(o, name, StringAccessor::null()).unwrap();
        assert!(s.is_null(o, name).unwrap());
        assert_eq!(s.get_string(o, name).unwrap(), None);

        s.set_timestamp(o, at, 1_500).unwrap();
        assert_eq!(s.get_timestamp(o, at).unwrap(), 1_500);
        let err = s.set_null(o, at).unwrap_err();
        assert_eq!(err.to_string(), "This field(at) is not nullable.");

        let err = s.add_column(t, "bad", 3, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalArgument);
        s.rollback(w).unwrap();
    }

    #[test]
    fn string_limit_from_config() {
        let s = Session::open_in_memory(Config::default().max_string_size(4)).unwrap();
        let w = s.begin_write().unwrap();
        let t = s.add_table(w, "t").unwrap();
        let name = s.add_column(t, "name", ColumnType::String.code(), false).unwrap();
        let o = s.create_object(t).unwrap();
        let err = s
            .set_string(o, name, StringAccessor::new(Some(b"hello")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalArgument);
        assert!(err.to_string().contains("exceeds the max string length 4"));
    }

    #[test]
    fn links_and_release() {
        let s = session();
        let w = s.begin_write().unwrap();
        let t = s.add_table(w, "t").unwrap();
        let next = s.add_link_column(t, "next", t).unwrap();
        let a = s.create_object(t).unwrap();
        let b = s.create_object(t).unwrap();
        assert_eq!(s.get_link(a, next).unwrap(), NOT_FOUND);
        s.set_link(a, next, s.object_key(b).unwrap()).unwrap();
        let via = s.get_link(a, next).unwrap();
        assert_eq!(s.object_key(via).unwrap(), s.object_key(b).unwrap());

        s.remove_object(b).unwrap();
        assert!(!s.object_is_valid(b));
        assert!(!s.object_is_valid(via));
        assert_eq!(s.get_link(a, next).unwrap(), NOT_FOUND);
        assert_eq!(s.release_detached(), 2);
        s.release_object(a).unwrap();
        assert!(s.release_object(a).is_err());
        s.commit(w).unwrap();
    }

    #[test]
    fn advance_invalidates_handles() {
        let s = session();
        let w = s.begin_write().unwrap();
        let t = s.add_table(w, "t").unwrap();
        s.create_object(t).unwrap();
        s.commit(w).unwrap();

        let r = s.begin_read().unwrap();
        let t = s.table(r, "t").unwrap();
        let o = s.object(t, 0).unwrap();

        let w = s.begin_write().unwrap();
        let wt = s.table(w, "t").unwrap();
        s.remove_object(s.object(wt, 0).unwrap()).unwrap();
        s.commit(w).unwrap();

        assert!(s.object_is_valid(o));
        assert!(s.advance(r).unwrap());
        assert!(!s.object_is_valid(o));
        let err = s.get_int(o, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert_eq!(s.transaction_version(r).unwrap(), 2);
    }

    #[test]
    fn try_begin_write_while_busy() {
        let s = session();
        let w = s.begin_write().unwrap();
        assert_eq!(s.try_begin_write().unwrap(), None);
        s.close(w).unwrap();
        let w = s.try_begin_write().unwrap().unwrap();
        assert_eq!(s.open_transactions(), 1);
        s.rollback(w).unwrap();
    }
}
