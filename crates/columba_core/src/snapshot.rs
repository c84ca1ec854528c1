//! Immutable snapshots of the whole table collection.
//!
//! A [`Snapshot`] is the unit of versioning. Committed snapshots are
//! shared behind `Arc` and never mutated; a write transaction clones the
//! collection lazily and applies [`Instruction`]s to its private copy.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::Limits;
use crate::error::{CoreError, CoreResult};
use crate::history::Instruction;
use crate::table::Table;
use crate::types::{ColKey, ObjKey, TableKey, VersionId};
use crate::value::Value;

/// All tables at one version.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    version: VersionId,
    tables: BTreeMap<TableKey, Arc<Table>>,
    names: BTreeMap<String, TableKey>,
    next_table: u32,
}

impl Snapshot {
    /// The empty snapshot at [`VersionId::INITIAL`].
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Version this snapshot was committed as.
    #[must_use]
    pub const fn version(&self) -> VersionId {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: VersionId) {
        self.version = version;
    }

    /// Looks up a table by key.
    #[must_use]
    pub fn table(&self, key: TableKey) -> Option<&Table> {
        self.tables.get(&key).map(AsRef::as_ref)
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.names.get(name).and_then(|key| self.table(*key))
    }

    /// Looks up a table, failing with `IllegalArgument` if it is gone.
    pub fn require_table(&self, key: TableKey) -> CoreResult<&Table> {
        self.table(key)
            .ok_or_else(|| CoreError::illegal_argument(format!("Table {key} does not exist.")))
    }

    /// Table names in ascending order.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.names.keys().cloned().collect()
    }

    /// All tables in key order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values().map(AsRef::as_ref)
    }

    /// Number of tables.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Key the next added table will receive.
    #[must_use]
    pub const fn next_table_key(&self) -> TableKey {
        TableKey::new(self.next_table)
    }

    fn table_mut(&mut self, key: TableKey) -> CoreResult<&mut Table> {
        self.tables
            .get_mut(&key)
            .map(Arc::make_mut)
            .ok_or_else(|| CoreError::illegal_argument(format!("Table {key} does not exist.")))
    }

    /// Applies one instruction. Nothing is modified when an error is
    /// returned.
    pub fn apply(&mut self, instruction: &Instruction, limits: &Limits) -> CoreResult<()> {
        match instruction {
            Instruction::AddTable { table, name } => self.add_table(*table, name),
            Instruction::RemoveTable { table } => self.remove_table(*table),
            Instruction::AddColumn { table, col, spec } => {
                if let Some(target) = spec.target() {
                    if self.table(target).is_none() {
                        return Err(CoreError::illegal_argument(format!(
                            "Link target table {target} of '{}' does not exist.",
                            spec.name()
                        )));
                    }
                }
                self.require_table(*table)?.check_new_column(spec)?;
                self.table_mut(*table)?.insert_column(*col, spec.clone())
            }
            Instruction::RemoveColumn { table, col } => {
                self.require_table(*table)?.require_column(*col)?;
                self.table_mut(*table)?.remove_column(*col)
            }
            Instruction::CreateObject { table, key } => {
                self.require_table(*table)?;
                self.table_mut(*table)?.insert_object(*key)
            }
            Instruction::RemoveObject { table, key } => self.remove_object(*table, *key),
            Instruction::Set {
                table,
                key,
                col,
                value,
            } => {
                let t = self.require_table(*table)?;
                t.check_set(*key, *col, value, limits)?;
                self.check_link(t, *col, value)?;
                self.table_mut(*table)?.set(*key, *col, value.clone(), limits)
            }
            Instruction::ListInsert {
                table,
                key,
                col,
                index,
                value,
            } => {
                let t = self.require_table(*table)?;
                t.check_element(*key, *col, value, limits)?;
                self.check_link(t, *col, value)?;
                self.table_mut(*table)?
                    .list_insert(*key, *col, *index, value.clone(), limits)
            }
            Instruction::ListSet {
                table,
                key,
                col,
                index,
                value,
            } => {
                let t = self.require_table(*table)?;
                t.check_element(*key, *col, value, limits)?;
                self.check_link(t, *col, value)?;
                self.table_mut(*table)?
                    .list_set(*key, *col, *index, value.clone(), limits)
            }
            Instruction::ListRemove {
                table,
                key,
                col,
                index,
            } => {
                self.require_table(*table)?.list(*key, *col)?;
                self.table_mut(*table)?
                    .list_remove(*key, *col, *index)
                    .map(drop)
            }
            Instruction::ListClear { table, key, col } => {
                self.require_table(*table)?.list(*key, *col)?;
                self.table_mut(*table)?.list_clear(*key, *col)
            }
        }
    }

    fn add_table(&mut self, key: TableKey, name: &str) -> CoreResult<()> {
        if name.is_empty() {
            return Err(CoreError::illegal_argument("Table name must not be empty."));
        }
        if self.names.contains_key(name) {
            return Err(CoreError::illegal_argument(format!(
                "Table '{name}' already exists."
            )));
        }
        if key != self.next_table_key() {
            return Err(CoreError::fatal(format!(
                "table key {key} does not match next key {}",
                self.next_table_key()
            )));
        }
        self.tables.insert(key, Arc::new(Table::new(key, name)));
        self.names.insert(name.to_owned(), key);
        self.next_table = self.next_table.wrapping_add(1);
        Ok(())
    }

    fn remove_table(&mut self, key: TableKey) -> CoreResult<()> {
        let name = self.require_table(key)?.name().to_owned();
        if let Some(source) = self
            .tables()
            .find(|t| t.key() != key && t.links_into(key))
        {
            return Err(CoreError::illegal_argument(format!(
                "Table '{name}' is the target of a link in '{}'.",
                source.name()
            )));
        }
        self.tables.remove(&key);
        self.names.remove(&name);
        Ok(())
    }

    fn remove_object(&mut self, table: TableKey, key: ObjKey) -> CoreResult<()> {
        let t = self.require_table(table)?;
        if !t.contains(key) {
            return Err(CoreError::illegal_argument(format!(
                "Object {key} does not exist in table '{}'.",
                t.name()
            )));
        }
        self.table_mut(table)?.remove_object(key)?;
        for source in self.tables.values_mut() {
            let points_here = source
                .columns()
                .any(|c| c.target() == Some(table) && c.links_to(key));
            if points_here {
                Arc::make_mut(source).unlink(table, key);
            }
        }
        Ok(())
    }

    fn check_link(&self, table: &Table, col: ColKey, value: &Value) -> CoreResult<()> {
        let Value::Link(target_key) = value else {
            return Ok(());
        };
        let column = table.require_column(col)?;
        let target = column
            .target()
            .and_then(|t| self.table(t))
            .ok_or_else(|| {
                CoreError::illegal_argument(format!(
                    "Link target table of '{}' no longer exists.",
                    column.name()
                ))
            })?;
        if !target.contains(*target_key) {
            return Err(CoreError::illegal_argument(format!(
                "Link target {target_key} does not exist in table '{}'.",
                target.name()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnSpec;

    struct Fixture {
        snap: Snapshot,
        person: TableKey,
        dog: TableKey,
        owner: ColKey,
        pets: ColKey,
    }

    fn apply(snap: &mut Snapshot, i: Instruction) {
        snap.apply(&i, &Limits::default()).unwrap();
    }

    fn fixture() -> Fixture {
        let mut snap = Snapshot::empty();
        let person = snap.next_table_key();
        apply(&mut snap, Instruction::AddTable { table: person, name: "person".into() });
        let dog = snap.next_table_key();
        apply(&mut snap, Instruction::AddTable { table: dog, name: "dog".into() });
        let owner = snap.table(dog).unwrap().next_column_key();
        apply(
            &mut snap,
            Instruction::AddColumn {
                table: dog,
                col: owner,
                spec: ColumnSpec::link("owner", person),
            },
        );
        let pets = snap.table(person).unwrap().next_column_key();
        apply(
            &mut snap,
            Instruction::AddColumn {
                table: person,
                col: pets,
                spec: ColumnSpec::link_list("pets", dog),
            },
        );
        Fixture { snap, person, dog, owner, pets }
    }

    fn create(snap: &mut Snapshot, table: TableKey) -> ObjKey {
        let key = snap.table(table).unwrap().next_object_key();
        apply(snap, Instruction::CreateObject { table, key });
        key
    }

    #[test]
    fn duplicate_table_name_rejected() {
        let mut f = fixture();
        let err = f
            .snap
            .apply(
                &Instruction::AddTable { table: f.snap.next_table_key(), name: "dog".into() },
                &Limits::default(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(f.snap.table_names(), vec!["dog".to_owned(), "person".to_owned()]);
    }

    #[test]
    fn link_to_missing_object_rejected() {
        let mut f = fixture();
        let d = create(&mut f.snap, f.dog);
        let err = f
            .snap
            .apply(
                &Instruction::Set {
                    table: f.dog,
                    key: d,
                    col: f.owner,
                    value: Value::Link(ObjKey::new(99)),
                },
                &Limits::default(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn removing_object_clears_incoming_links() {
        let mut f = fixture();
        let p = create(&mut f.snap, f.person);
        let d = create(&mut f.snap, f.dog);
        apply(
            &mut f.snap,
            Instruction::Set { table: f.dog, key: d, col: f.owner, value: Value::Link(p) },
        );
        apply(
            &mut f.snap,
            Instruction::ListInsert {
                table: f.person,
                key: p,
                col: f.pets,
                index: 0,
                value: Value::Link(d),
            },
        );

        let before = f.snap.clone();
        apply(&mut f.snap, Instruction::RemoveObject { table: f.person, key: p });
        assert_eq!(f.snap.table(f.dog).unwrap().get(d, f.owner).unwrap(), Value::Null);
        // earlier snapshot untouched
        assert_eq!(before.table(f.dog).unwrap().get(d, f.owner).unwrap(), Value::Link(p));

        apply(&mut f.snap, Instruction::RemoveObject { table: f.dog, key: d });
        assert!(f.snap.table(f.dog).unwrap().is_empty());
    }

    #[test]
    fn link_target_table_cannot_be_removed() {
        let mut f = fixture();
        let err = f
            .snap
            .apply(&Instruction::RemoveTable { table: f.person }, &Limits::default())
            .unwrap_err();
        assert!(err.to_string().contains("target of a link"));

        apply(&mut f.snap, Instruction::RemoveColumn { table: f.dog, col: f.owner });
        apply(&mut f.snap, Instruction::RemoveColumn { table: f.person, col: f.pets });
        apply(&mut f.snap, Instruction::RemoveTable { table: f.person });
        assert!(f.snap.table_by_name("person").is_none());
    }

    #[test]
    fn mismatched_allocated_key_rejected() {
        let mut f = fixture();
        let err = f
            .snap
            .apply(
                &Instruction::CreateObject { table: f.person, key: ObjKey::new(5) },
                &Limits::default(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::FatalError);
    }

    #[test]
    fn add_column_requires_existing_target() {
        let mut f = fixture();
        let col = f.snap.table(f.dog).unwrap().next_column_key();
        let err = f
            .snap
            .apply(
                &Instruction::AddColumn {
                    table: f.dog,
                    col,
                    spec: ColumnSpec::link("vet", TableKey::new(77)),
                },
                &Limits::default(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
