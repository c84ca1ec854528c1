use tracing::error;

use crate::column::ColumnSpec;
use crate::error::{CoreError, CoreResult};
use crate::handle::{Anchor, Obj};
use crate::history::Instruction;
use crate::registry;
use crate::snapshot::Snapshot;
use crate::table::Table;
use crate::types::{ColKey, ObjKey, TableKey};
use crate::value::{ColumnType, Value};

fn detached() -> CoreError {
    error!("Table is no longer attached!");
    CoreError::table_invalid()
}

fn resolve(snap: &Snapshot, key: TableKey) -> CoreResult<&Table> {
    snap.table(key).ok_or_else(detached)
}

/// Handle to a table in one transaction.
#[derive(Debug, Clone)]
pub struct TableRef {
    anchor: Anchor,
    key: TableKey,
}

impl TableRef {
    pub(crate) fn new(anchor: Anchor, key: TableKey) -> Self {
        Self { anchor, key }
    }

    /// Whether the table can still be operated on.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.anchor.check(|snap| snap.table(self.key).is_some())
    }

    /// Table key.
    #[must_use]
    pub const fn key(&self) -> TableKey {
        self.key
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&Table) -> CoreResult<R>) -> CoreResult<R> {
        self.anchor.read(detached, |snap| f(resolve(snap, self.key)?))
    }

    fn write(
        &self,
        build: impl FnOnce(&Snapshot, &Table) -> CoreResult<Instruction>,
    ) -> CoreResult<Instruction> {
        let key = self.key;
        self.anchor.write(detached, |snap| build(snap, resolve(snap, key)?))
    }

    /// Table name.
    pub fn name(&self) -> CoreResult<String> {
        self.read(|t| Ok(t.name().to_owned()))
    }

    /// Number of objects.
    pub fn size(&self) -> CoreResult<usize> {
        self.read(|t| Ok(t.size()))
    }

    /// Whether the table has no objects.
    pub fn is_empty(&self) -> CoreResult<bool> {
        self.read(|t| Ok(t.is_empty()))
    }

    /// Object keys in ascending order.
    pub fn keys(&self) -> CoreResult<Vec<ObjKey>> {
        self.read(|t| Ok(t.keys()))
    }

    /// Column key by name; `None` if absent.
    pub fn column_key(&self, name: &str) -> CoreResult<Option<ColKey>> {
        self.read(|t| Ok(t.column_key(name)))
    }

    /// Column keys in creation order.
    pub fn column_keys(&self) -> CoreResult<Vec<ColKey>> {
        self.read(|t| Ok(t.columns().map(|c| c.key()).collect()))
    }

    /// Column declaration.
    pub fn column_spec(&self, col: ColKey) -> CoreResult<ColumnSpec> {
        self.read(|t| Ok(t.require_column(col)?.spec().clone()))
    }

    /// Column name.
    pub fn column_name(&self, col: ColKey) -> CoreResult<String> {
        self.read(|t| Ok(t.require_column(col)?.name().to_owned()))
    }

    /// Declared column type.
    pub fn column_type(&self, col: ColKey) -> CoreResult<ColumnType> {
        self.read(|t| Ok(t.require_column(col)?.column_type()))
    }

    /// Declared nullability.
    pub fn is_nullable(&self, col: ColKey) -> CoreResult<bool> {
        self.read(|t| Ok(t.require_column(col)?.is_nullable()))
    }

    /// Whether cells of `col` are lists.
    pub fn is_list(&self, col: ColKey) -> CoreResult<bool> {
        self.read(|t| Ok(t.require_column(col)?.is_list()))
    }

    /// Target table of a link column.
    pub fn link_target(&self, col: ColKey) -> CoreResult<Option<TableRef>> {
        let target = self.read(|t| Ok(t.require_column(col)?.target()))?;
        Ok(target.map(|key| TableRef::new(self.anchor.clone(), key)))
    }

    /// Checks that `col` has exactly type `expected`.
    ///
    /// # Errors
    ///
    /// `IllegalArgument` ("ColumnType of '<name>' is invalid.") otherwise.
    pub fn type_valid(&self, col: ColKey, expected: ColumnType) -> CoreResult<bool> {
        self.read(|t| registry::type_valid(t, col, expected))
    }

    /// Checks that `col` accepts null.
    pub fn column_nullable(&self, col: ColKey) -> CoreResult<bool> {
        self.read(|t| registry::column_nullable(t, col))
    }

    /// Whether `key` names a live object.
    pub fn contains(&self, key: ObjKey) -> CoreResult<bool> {
        self.read(|t| Ok(t.contains(key)))
    }

    /// Handle to an existing object.
    ///
    /// # Errors
    ///
    /// `IllegalArgument` if there is no such object.
    pub fn object(&self, key: ObjKey) -> CoreResult<Obj> {
        self.try_object(key)?.ok_or_else(|| {
            CoreError::illegal_argument(format!("Object {key} does not exist in this table."))
        })
    }

    /// Handle to an object, or `None` if there is no such object.
    pub fn try_object(&self, key: ObjKey) -> CoreResult<Option<Obj>> {
        let present = self.contains(key)?;
        Ok(present.then(|| Obj::new(self.anchor.clone(), self.key, key)))
    }

    /// Smallest key whose value in `col` equals `value`.
    pub fn find_first(&self, col: ColKey, value: impl Into<Value>) -> CoreResult<Option<ObjKey>> {
        let value = value.into();
        self.read(|t| t.find_first(col, &value))
    }

    /// Adds a column from a full declaration.
    pub fn add_column_spec(&self, spec: ColumnSpec) -> CoreResult<ColKey> {
        let table = self.key;
        let instruction = self.write(|_, t| {
            Ok(Instruction::AddColumn {
                table,
                col: t.next_column_key(),
                spec,
            })
        })?;
        match instruction {
            Instruction::AddColumn { col, .. } => Ok(col),
            _ => Err(CoreError::fatal("add_column recorded a different instruction")),
        }
    }

    /// Adds a scalar column.
    pub fn add_column(&self, name: &str, ty: ColumnType, nullable: bool) -> CoreResult<ColKey> {
        self.add_column_spec(ColumnSpec::scalar(name, ty, nullable))
    }

    /// Adds a list column of primitives.
    pub fn add_list_column(
        &self,
        name: &str,
        element: ColumnType,
        nullable_elements: bool,
    ) -> CoreResult<ColKey> {
        self.add_column_spec(ColumnSpec::list(name, element, nullable_elements))
    }

    /// Adds a link column pointing at `target`.
    pub fn add_link_column(&self, name: &str, target: &TableRef) -> CoreResult<ColKey> {
        self.add_column_spec(ColumnSpec::link(name, target.key()))
    }

    /// Adds a link-list column pointing at `target`.
    pub fn add_link_list_column(&self, name: &str, target: &TableRef) -> CoreResult<ColKey> {
        self.add_column_spec(ColumnSpec::link_list(name, target.key()))
    }

    /// Removes a column. Its key is never reused.
    pub fn remove_column(&self, col: ColKey) -> CoreResult<()> {
        let table = self.key;
        self.write(|_, _| Ok(Instruction::RemoveColumn { table, col }))?;
        Ok(())
    }

    /// Creates an object with default values.
    pub fn create_object(&self) -> CoreResult<Obj> {
        let table = self.key;
        let instruction = self.write(|_, t| {
            Ok(Instruction::CreateObject {
                table,
                key: t.next_object_key(),
            })
        })?;
        match instruction {
            Instruction::CreateObject { key, .. } => {
                Ok(Obj::new(self.anchor.clone(), self.key, key))
            }
            _ => Err(CoreError::fatal("create_object recorded a different instruction")),
        }
    }

    /// Removes an object and clears links pointing at it.
    pub fn remove_object(&self, key: ObjKey) -> CoreResult<()> {
        let table = self.key;
        self.write(|_, _| Ok(Instruction::RemoveObject { table, key }))?;
        Ok(())
    }

    /// Removes every object.
    pub fn clear(&self) -> CoreResult<()> {
        for key in self.keys()? {
            self.remove_object(key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::value::{ColumnType, Value};
    use crate::Database;

    #[test]
    fn schema_and_objects() {
        let db = Database::open_in_memory().unwrap();
        let mut txn = db.begin_write().unwrap();
        let person = txn.add_table("person").unwrap();
        let age = person.add_column("age", ColumnType::Int, false).unwrap();
        let name = person.add_column("name", ColumnType::String, true).unwrap();

        assert_eq!(person.name().unwrap(), "person");
        assert_eq!(person.column_key("age").unwrap(), Some(age));
        assert_eq!(person.column_key("missing").unwrap(), None);
        assert_eq!(person.column_keys().unwrap(), vec![age, name]);
        assert!(person.is_nullable(name).unwrap());
        assert!(!person.is_list(age).unwrap());

        let a = person.create_object().unwrap();
        let b = person.create_object().unwrap();
        b.set(age, 30).unwrap();
        assert_eq!(person.size().unwrap(), 2);
        assert_eq!(person.find_first(age, 30).unwrap(), Some(b.key()));
        assert_eq!(person.find_first(age, 31).unwrap(), None);

        person.remove_object(a.key()).unwrap();
        assert!(!a.is_valid());
        assert_eq!(person.keys().unwrap(), vec![b.key()]);
        txn.commit().unwrap();
    }

    #[test]
    fn writes_rejected_in_read_transaction() {
        let db = Database::open_in_memory().unwrap();
        db.write(|txn| {
            txn.add_table("person")?;
            Ok(())
        })
        .unwrap();

        let read = db.begin_read();
        let person = read.require_table("person").unwrap();
        let err = person.add_column("x", ColumnType::Int, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert_eq!(
            err.to_string(),
            "Cannot modify managed objects outside of a write transaction."
        );
    }

    #[test]
    fn handle_invalid_after_commit() {
        let db = Database::open_in_memory().unwrap();
        let mut txn = db.begin_write().unwrap();
        let person = txn.add_table("person").unwrap();
        txn.commit().unwrap();

        assert!(!person.is_valid());
        let err = person.size().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert_eq!(err.to_string(), "Table is no longer valid to operate on.");
    }

    #[test]
    fn removed_table_handle_is_invalid() {
        let db = Database::open_in_memory().unwrap();
        let txn = db.begin_write().unwrap();
        let person = txn.add_table("person").unwrap();
        txn.remove_table("person").unwrap();
        assert!(!person.is_valid());
    }

    #[test]
    fn type_and_nullability_checks() {
        let db = Database::open_in_memory().unwrap();
        let txn = db.begin_write().unwrap();
        let t = txn.add_table("t").unwrap();
        let s = t.add_column("s", ColumnType::String, true).unwrap();
        let l = t.add_link_column("self", &t).unwrap();
        assert!(t.type_valid(s, ColumnType::String).unwrap());
        assert!(t.type_valid(s, ColumnType::Int).is_err());
        assert!(t.column_nullable(l).unwrap());
        assert_eq!(t.link_target(l).unwrap().unwrap().key(), t.key());
        assert!(t.find_first(s, Value::Null).unwrap().is_none());
    }
}
