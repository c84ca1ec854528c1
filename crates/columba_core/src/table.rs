//! Object tables.
//!
//! A table is a set of columns plus the set of live object keys. Columns
//! and the row index sit behind `Arc`s so that a write transaction only
//! copies the parts it actually touches.

use std::collections::HashMap;
use std::sync::Arc;

use crate::column::{Column, ColumnSpec};
use crate::config::Limits;
use crate::error::{CoreError, CoreResult};
use crate::types::{ColKey, ObjKey, TableKey};
use crate::value::Value;

#[derive(Debug, Clone, Default)]
struct RowIndex {
    keys: Vec<ObjKey>,
    slots: HashMap<ObjKey, usize>,
}

/// One table of one snapshot.
#[derive(Debug, Clone)]
pub struct Table {
    key: TableKey,
    name: String,
    columns: Vec<Arc<Column>>,
    next_col: u32,
    rows: Arc<RowIndex>,
    next_obj: i64,
}

impl Table {
    pub(crate) fn new(key: TableKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            columns: Vec::new(),
            next_col: 1,
            rows: Arc::new(RowIndex::default()),
            next_obj: 0,
        }
    }

    /// Table key.
    #[must_use]
    pub const fn key(&self) -> TableKey {
        self.key
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live objects.
    #[must_use]
    pub fn size(&self) -> usize {
        self.rows.keys.len()
    }

    /// Whether the table has no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.keys.is_empty()
    }

    /// Whether `key` names a live object.
    #[must_use]
    pub fn contains(&self, key: ObjKey) -> bool {
        self.rows.slots.contains_key(&key)
    }

    /// Live object keys in ascending order.
    #[must_use]
    pub fn keys(&self) -> Vec<ObjKey> {
        let mut keys = self.rows.keys.clone();
        keys.sort_unstable();
        keys
    }

    /// Columns in creation order.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().map(AsRef::as_ref)
    }

    /// Looks up a column by key.
    #[must_use]
    pub fn column(&self, col: ColKey) -> Option<&Column> {
        self.position(col).map(|i| self.columns[i].as_ref())
    }

    /// Looks up a column key by name.
    #[must_use]
    pub fn column_key(&self, name: &str) -> Option<ColKey> {
        self.columns
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.key())
    }

    /// Looks up a column, failing with `IllegalArgument` for unknown keys.
    pub fn require_column(&self, col: ColKey) -> CoreResult<&Column> {
        self.column(col).ok_or_else(|| {
            CoreError::illegal_argument(format!(
                "Column key {col} is not valid in table '{}'.",
                self.name
            ))
        })
    }

    /// Whether any column of this table links into `target`.
    #[must_use]
    pub fn links_into(&self, target: TableKey) -> bool {
        self.columns.iter().any(|c| c.target() == Some(target))
    }

    fn position(&self, col: ColKey) -> Option<usize> {
        self.columns.iter().position(|c| c.key() == col)
    }

    fn slot(&self, key: ObjKey) -> CoreResult<usize> {
        self.rows.slots.get(&key).copied().ok_or_else(|| {
            CoreError::illegal_argument(format!(
                "Object {key} does not exist in table '{}'.",
                self.name
            ))
        })
    }

    /// Key the next added column will receive.
    ///
    /// The table key occupies the upper half so that keys from different
    /// tables never collide.
    #[must_use]
    pub fn next_column_key(&self) -> ColKey {
        ColKey::new((i64::from(self.key.as_u32()) << 32) | i64::from(self.next_col))
    }

    /// Key the next created object will receive.
    #[must_use]
    pub const fn next_object_key(&self) -> ObjKey {
        ObjKey::new(self.next_obj)
    }

    pub(crate) fn check_new_column(&self, spec: &ColumnSpec) -> CoreResult<()> {
        spec.validate()?;
        if self.column_key(spec.name()).is_some() {
            return Err(CoreError::illegal_argument(format!(
                "Column '{}' already exists in table '{}'.",
                spec.name(),
                self.name
            )));
        }
        Ok(())
    }

    /// Adds a column under the key the caller allocated.
    pub(crate) fn insert_column(&mut self, col: ColKey, spec: ColumnSpec) -> CoreResult<()> {
        self.check_new_column(&spec)?;
        let expected = self.next_column_key();
        if col != expected {
            return Err(CoreError::fatal(format!(
                "column key {col} does not match next key {expected} in '{}'",
                self.name
            )));
        }
        let column = Column::new(col, spec, self.size())?;
        self.columns.push(Arc::new(column));
        self.next_col = self.next_col.wrapping_add(1);
        Ok(())
    }

    pub(crate) fn remove_column(&mut self, col: ColKey) -> CoreResult<()> {
        self.require_column(col)?;
        self.columns.retain(|c| c.key() != col);
        Ok(())
    }

    /// Creates the object under the key the caller allocated.
    pub(crate) fn insert_object(&mut self, key: ObjKey) -> CoreResult<()> {
        if key != self.next_object_key() {
            return Err(CoreError::fatal(format!(
                "object key {key} does not match next key {} in '{}'",
                self.next_obj, self.name
            )));
        }
        let rows = Arc::make_mut(&mut self.rows);
        rows.keys
            .try_reserve(1)
            .map_err(|_| CoreError::OutOfMemory {
                what: format!("row index of '{}'", self.name),
                requested: 1,
            })?;
        for column in &mut self.columns {
            Arc::make_mut(column).push_default()?;
        }
        rows.slots.insert(key, rows.keys.len());
        rows.keys.push(key);
        self.next_obj += 1;
        Ok(())
    }

    pub(crate) fn remove_object(&mut self, key: ObjKey) -> CoreResult<()> {
        let slot = self.slot(key)?;
        let rows = Arc::make_mut(&mut self.rows);
        rows.keys.swap_remove(slot);
        rows.slots.remove(&key);
        if let Some(&moved) = rows.keys.get(slot) {
            rows.slots.insert(moved, slot);
        }
        for column in &mut self.columns {
            Arc::make_mut(column).swap_remove(slot);
        }
        Ok(())
    }

    /// Reads a scalar value.
    pub fn get(&self, key: ObjKey, col: ColKey) -> CoreResult<Value> {
        let column = self.require_column(col)?;
        if column.is_list() {
            return Err(CoreError::illegal_argument(format!(
                "'{}' is a list; read it element-wise.",
                column.name()
            )));
        }
        Ok(column.get(self.slot(key)?))
    }

    /// Reads a list cell.
    pub fn list(&self, key: ObjKey, col: ColKey) -> CoreResult<&[Value]> {
        let column = self.require_column(col)?;
        let slot = self.slot(key)?;
        column.list(slot).ok_or_else(|| {
            CoreError::illegal_argument(format!("Column '{}' is not a list.", column.name()))
        })
    }

    /// Validates a scalar write without performing it.
    pub(crate) fn check_set(
        &self,
        key: ObjKey,
        col: ColKey,
        value: &Value,
        limits: &Limits,
    ) -> CoreResult<()> {
        let column = self.require_column(col)?;
        self.slot(key)?;
        column.check_scalar(value, limits)
    }

    pub(crate) fn set(
        &mut self,
        key: ObjKey,
        col: ColKey,
        value: Value,
        limits: &Limits,
    ) -> CoreResult<()> {
        self.check_set(key, col, &value, limits)?;
        let slot = self.slot(key)?;
        let i = self.position(col).ok_or_else(|| CoreError::fatal("column vanished"))?;
        Arc::make_mut(&mut self.columns[i]).set(slot, value)
    }

    /// Validates a list element write without performing it.
    pub(crate) fn check_element(
        &self,
        key: ObjKey,
        col: ColKey,
        value: &Value,
        limits: &Limits,
    ) -> CoreResult<()> {
        let column = self.require_column(col)?;
        self.slot(key)?;
        column.check_element(value, limits)
    }

    fn list_mut(&mut self, key: ObjKey, col: ColKey) -> CoreResult<&mut Vec<Value>> {
        let slot = self.slot(key)?;
        let i = self.position(col).ok_or_else(|| {
            CoreError::illegal_argument(format!(
                "Column key {col} is not valid in table '{}'.",
                self.name
            ))
        })?;
        let column = Arc::make_mut(&mut self.columns[i]);
        let name = column.name().to_owned();
        column
            .list_mut(slot)
            .ok_or_else(|| CoreError::illegal_argument(format!("Column '{name}' is not a list.")))
    }

    pub(crate) fn list_insert(
        &mut self,
        key: ObjKey,
        col: ColKey,
        index: usize,
        value: Value,
        limits: &Limits,
    ) -> CoreResult<()> {
        self.check_element(key, col, &value, limits)?;
        let len = self.list(key, col)?.len();
        if index > len {
            return Err(CoreError::index_out_of_bounds("list insert", index, len));
        }
        let list = self.list_mut(key, col)?;
        list.try_reserve(1).map_err(|_| CoreError::OutOfMemory {
            what: "list".to_owned(),
            requested: 1,
        })?;
        list.insert(index, value);
        Ok(())
    }

    pub(crate) fn list_set(
        &mut self,
        key: ObjKey,
        col: ColKey,
        index: usize,
        value: Value,
        limits: &Limits,
    ) -> CoreResult<()> {
        self.check_element(key, col, &value, limits)?;
        let len = self.list(key, col)?.len();
        if index >= len {
            return Err(CoreError::index_out_of_bounds("list", index, len));
        }
        self.list_mut(key, col)?[index] = value;
        Ok(())
    }

    pub(crate) fn list_remove(
        &mut self,
        key: ObjKey,
        col: ColKey,
        index: usize,
    ) -> CoreResult<Value> {
        let len = self.list(key, col)?.len();
        if index >= len {
            return Err(CoreError::index_out_of_bounds("list", index, len));
        }
        Ok(self.list_mut(key, col)?.remove(index))
    }

    pub(crate) fn list_clear(&mut self, key: ObjKey, col: ColKey) -> CoreResult<()> {
        self.list(key, col)?;
        self.list_mut(key, col)?.clear();
        Ok(())
    }

    /// Smallest object key whose value in `col` equals `value`.
    pub fn find_first(&self, col: ColKey, value: &Value) -> CoreResult<Option<ObjKey>> {
        let column = self.require_column(col)?;
        if column.is_list() {
            return Err(CoreError::unsupported(format!(
                "find_first is not supported on list column '{}'.",
                column.name()
            )));
        }
        Ok(column
            .matching_slots(value)
            .map(|slot| self.rows.keys[slot])
            .min())
    }

    /// Drops every reference to `key` of table `target`. Returns the count.
    pub(crate) fn unlink(&mut self, target: TableKey, key: ObjKey) -> usize {
        let mut dropped = 0;
        for column in &mut self.columns {
            if column.target() == Some(target) && column.links_to(key) {
                dropped += Arc::make_mut(column).unlink(key);
            }
        }
        dropped
    }
}
