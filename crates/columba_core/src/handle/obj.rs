use tracing::error;

use crate::error::{CoreError, CoreResult};
use crate::handle::{Anchor, TableRef};
use crate::history::Instruction;
use crate::registry;
use crate::snapshot::Snapshot;
use crate::table::Table;
use crate::timestamp::Timestamp;
use crate::types::{ColKey, ObjKey, TableKey};
use crate::value::{ColumnType, Value};

/// Handle to one object (row).
///
/// Valid while its transaction has not moved to another version and the
/// object exists in the version it sees.
#[derive(Debug, Clone)]
pub struct Obj {
    anchor: Anchor,
    table: TableKey,
    key: ObjKey,
}

impl Obj {
    pub(crate) fn new(anchor: Anchor, table: TableKey, key: ObjKey) -> Self {
        Self { anchor, table, key }
    }

    /// Object key.
    #[must_use]
    pub const fn key(&self) -> ObjKey {
        self.key
    }

    /// Key of the owning table.
    #[must_use]
    pub const fn table_key(&self) -> TableKey {
        self.table
    }

    /// Handle to the owning table.
    #[must_use]
    pub fn table(&self) -> TableRef {
        TableRef::new(self.anchor.clone(), self.table)
    }

    /// Whether the object can still be operated on.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.anchor.check(|snap| {
            snap.table(self.table)
                .is_some_and(|t| t.contains(self.key))
        })
    }

    fn detached(&self) -> CoreError {
        error!("Row {} is no longer attached!", self.key.value());
        CoreError::object_invalid()
    }

    fn resolve<'s>(&self, snap: &'s Snapshot) -> CoreResult<&'s Table> {
        snap.table(self.table)
            .filter(|t| t.contains(self.key))
            .ok_or_else(|| self.detached())
    }

    fn read<R>(&self, f: impl FnOnce(&Table) -> CoreResult<R>) -> CoreResult<R> {
        self.anchor
            .read(|| self.detached(), |snap| f(self.resolve(snap)?))
    }

    fn write(&self, build: impl FnOnce(&Table) -> CoreResult<Instruction>) -> CoreResult<()> {
        self.anchor
            .write(|| self.detached(), |snap| build(self.resolve(snap)?))?;
        Ok(())
    }

    /// Reads any scalar value.
    pub fn get(&self, col: ColKey) -> CoreResult<Value> {
        self.read(|t| t.get(self.key, col))
    }

    fn typed<T>(
        &self,
        col: ColKey,
        ty: ColumnType,
        pick: impl FnOnce(&Value) -> Option<T>,
    ) -> CoreResult<Option<T>> {
        self.read(|t| {
            registry::type_valid(t, col, ty)?;
            Ok(pick(&t.get(self.key, col)?))
        })
    }

    /// Reads an int column. `None` means null.
    ///
    /// # Errors
    ///
    /// `IllegalArgument` if `col` is not an int column.
    pub fn get_int(&self, col: ColKey) -> CoreResult<Option<i64>> {
        self.typed(col, ColumnType::Int, Value::as_int)
    }

    /// Reads a bool column.
    pub fn get_bool(&self, col: ColKey) -> CoreResult<Option<bool>> {
        self.typed(col, ColumnType::Bool, Value::as_bool)
    }

    /// Reads a string column.
    pub fn get_string(&self, col: ColKey) -> CoreResult<Option<String>> {
        self.typed(col, ColumnType::String, |v| v.as_str().map(str::to_owned))
    }

    /// Reads a binary column.
    pub fn get_binary(&self, col: ColKey) -> CoreResult<Option<Vec<u8>>> {
        self.typed(col, ColumnType::Binary, |v| v.as_binary().map(<[u8]>::to_vec))
    }

    /// Reads a timestamp column.
    pub fn get_timestamp(&self, col: ColKey) -> CoreResult<Option<Timestamp>> {
        self.typed(col, ColumnType::Timestamp, Value::as_timestamp)
    }

    /// Reads a float column.
    pub fn get_float(&self, col: ColKey) -> CoreResult<Option<f32>> {
        self.typed(col, ColumnType::Float, Value::as_float)
    }

    /// Reads a double column.
    pub fn get_double(&self, col: ColKey) -> CoreResult<Option<f64>> {
        self.typed(col, ColumnType::Double, Value::as_double)
    }

    /// Follows a link column.
    pub fn get_link(&self, col: ColKey) -> CoreResult<Option<Obj>> {
        let (target, key) = self.read(|t| {
            registry::type_valid(t, col, ColumnType::Link)?;
            let target = t.require_column(col)?.target();
            Ok((target, t.get(self.key, col)?.as_link()))
        })?;
        Ok(target
            .zip(key)
            .map(|(table, key)| Obj::new(self.anchor.clone(), table, key)))
    }

    /// Whether the value in `col` is null.
    pub fn is_null(&self, col: ColKey) -> CoreResult<bool> {
        Ok(self.get(col)?.is_null())
    }

    /// Sets a scalar value.
    ///
    /// # Errors
    ///
    /// `IllegalArgument` on a type mismatch, a null for a non-nullable
    /// column, a list column, a too long string or binary, or a link to a
    /// missing object. `IllegalState` outside a write transaction.
    pub fn set(&self, col: ColKey, value: impl Into<Value>) -> CoreResult<()> {
        let (table, key, value) = (self.table, self.key, value.into());
        self.write(|_| Ok(Instruction::Set { table, key, col, value }))
    }

    /// Sets `col` to null.
    pub fn set_null(&self, col: ColKey) -> CoreResult<()> {
        let (table, key) = (self.table, self.key);
        self.write(|t| {
            registry::column_nullable(t, col)?;
            Ok(Instruction::Set {
                table,
                key,
                col,
                value: Value::Null,
            })
        })
    }

    /// Copy of a list cell.
    pub fn list(&self, col: ColKey) -> CoreResult<Vec<Value>> {
        self.read(|t| Ok(t.list(self.key, col)?.to_vec()))
    }

    /// Length of a list cell.
    pub fn list_len(&self, col: ColKey) -> CoreResult<usize> {
        self.read(|t| Ok(t.list(self.key, col)?.len()))
    }

    /// One list element.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index >= len`.
    pub fn list_get(&self, col: ColKey, index: usize) -> CoreResult<Value> {
        self.read(|t| {
            let list = t.list(self.key, col)?;
            list.get(index)
                .cloned()
                .ok_or_else(|| CoreError::index_out_of_bounds("list", index, list.len()))
        })
    }

    /// Inserts an element at `index` (`index == len` appends).
    pub fn list_insert(
        &self,
        col: ColKey,
        index: usize,
        value: impl Into<Value>,
    ) -> CoreResult<()> {
        let (table, key, value) = (self.table, self.key, value.into());
        self.write(|_| {
            Ok(Instruction::ListInsert {
                table,
                key,
                col,
                index,
                value,
            })
        })
    }

    /// Appends an element.
    pub fn list_push(&self, col: ColKey, value: impl Into<Value>) -> CoreResult<()> {
        let (table, key, value) = (self.table, self.key, value.into());
        self.write(|t| {
            Ok(Instruction::ListInsert {
                table,
                key,
                col,
                index: t.list(key, col)?.len(),
                value,
            })
        })
    }

    /// Replaces the element at `index`.
    pub fn list_set(&self, col: ColKey, index: usize, value: impl Into<Value>) -> CoreResult<()> {
        let (table, key, value) = (self.table, self.key, value.into());
        self.write(|_| {
            Ok(Instruction::ListSet {
                table,
                key,
                col,
                index,
                value,
            })
        })
    }

    /// Removes the element at `index`.
    pub fn list_remove(&self, col: ColKey, index: usize) -> CoreResult<()> {
        let (table, key) = (self.table, self.key);
        self.write(|_| {
            Ok(Instruction::ListRemove {
                table,
                key,
                col,
                index,
            })
        })
    }

    /// Empties a list.
    pub fn list_clear(&self, col: ColKey) -> CoreResult<()> {
        let (table, key) = (self.table, self.key);
        self.write(|_| Ok(Instruction::ListClear { table, key, col }))
    }

    /// Deletes the object. This handle and all others to it become invalid.
    pub fn remove(&self) -> CoreResult<()> {
        let (table, key) = (self.table, self.key);
        self.write(|_| Ok(Instruction::RemoveObject { table, key }))
    }
}
