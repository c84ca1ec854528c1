//! Per-column value arrays.

use crate::column::spec::ColumnSpec;
use crate::config::Limits;
use crate::error::{CoreError, CoreResult};
use crate::timestamp::Timestamp;
use crate::types::{ColKey, ObjKey, TableKey};
use crate::value::{ColumnType, Value};

/// Typed cell arrays, one entry per row slot. `None` is a stored null.
#[derive(Debug, Clone)]
enum Cells {
    Int(Vec<Option<i64>>),
    Bool(Vec<Option<bool>>),
    String(Vec<Option<String>>),
    Binary(Vec<Option<Vec<u8>>>),
    Timestamp(Vec<Option<Timestamp>>),
    Float(Vec<Option<f32>>),
    Double(Vec<Option<f64>>),
    Link(Vec<Option<ObjKey>>),
    List(Vec<Vec<Value>>),
}

/// Applies `$body` to the vector inside any scalar variant.
macro_rules! with_scalar_cells {
    ($cells:expr, $v:ident => $body:expr, list $l:ident => $list_body:expr) => {
        match $cells {
            Cells::Int($v) => $body,
            Cells::Bool($v) => $body,
            Cells::String($v) => $body,
            Cells::Binary($v) => $body,
            Cells::Timestamp($v) => $body,
            Cells::Float($v) => $body,
            Cells::Double($v) => $body,
            Cells::Link($v) => $body,
            Cells::List($l) => $list_body,
        }
    };
}

impl Cells {
    fn empty(spec: &ColumnSpec) -> Self {
        if spec.is_list() {
            return Self::List(Vec::new());
        }
        match spec.column_type() {
            ColumnType::Int => Self::Int(Vec::new()),
            ColumnType::Bool => Self::Bool(Vec::new()),
            ColumnType::String => Self::String(Vec::new()),
            ColumnType::Binary => Self::Binary(Vec::new()),
            ColumnType::Timestamp => Self::Timestamp(Vec::new()),
            ColumnType::Float => Self::Float(Vec::new()),
            ColumnType::Double => Self::Double(Vec::new()),
            ColumnType::Link | ColumnType::LinkList => Self::Link(Vec::new()),
        }
    }

    fn len(&self) -> usize {
        with_scalar_cells!(self, v => v.len(), list l => l.len())
    }

    fn reserve(&mut self, additional: usize) -> Result<(), std::collections::TryReserveError> {
        with_scalar_cells!(
            self,
            v => v.try_reserve(additional),
            list l => l.try_reserve(additional)
        )
    }

    fn swap_remove(&mut self, slot: usize) {
        with_scalar_cells!(self, v => { v.swap_remove(slot); }, list l => { l.swap_remove(slot); });
    }
}

/// The value array of one column.
#[derive(Debug, Clone)]
pub struct Column {
    key: ColKey,
    spec: ColumnSpec,
    cells: Cells,
}

impl Column {
    /// Creates a column already holding `rows` default cells.
    pub(crate) fn new(key: ColKey, spec: ColumnSpec, rows: usize) -> CoreResult<Self> {
        let mut column = Self {
            cells: Cells::empty(&spec),
            key,
            spec,
        };
        column.reserve(rows)?;
        for _ in 0..rows {
            column.push_default()?;
        }
        Ok(column)
    }

    /// Column key.
    #[must_use]
    pub const fn key(&self) -> ColKey {
        self.key
    }

    /// Declaration.
    #[must_use]
    pub const fn spec(&self) -> &ColumnSpec {
        &self.spec
    }

    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// Declared type.
    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        self.spec.column_type()
    }

    /// Declared nullability.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.spec.is_nullable()
    }

    /// Whether each cell is a list.
    #[must_use]
    pub const fn is_list(&self) -> bool {
        self.spec.is_list()
    }

    /// Link target table.
    #[must_use]
    pub const fn target(&self) -> Option<TableKey> {
        self.spec.target()
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the column holds no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn reserve(&mut self, additional: usize) -> CoreResult<()> {
        self.cells
            .reserve(additional)
            .map_err(|_| CoreError::OutOfMemory {
                what: format!("column '{}'", self.name()),
                requested: additional,
            })
    }

    /// Appends the cell for a new row.
    pub(crate) fn push_default(&mut self) -> CoreResult<()> {
        self.reserve(1)?;
        let nullable = self.is_nullable();
        match &mut self.cells {
            Cells::List(l) => l.push(Vec::new()),
            Cells::Link(v) => v.push(None),
            Cells::Int(v) => v.push((!nullable).then_some(0)),
            Cells::Bool(v) => v.push((!nullable).then_some(false)),
            Cells::String(v) => v.push((!nullable).then(String::new)),
            Cells::Binary(v) => v.push((!nullable).then(Vec::new)),
            Cells::Timestamp(v) => v.push((!nullable).then(Timestamp::default)),
            Cells::Float(v) => v.push((!nullable).then_some(0.0)),
            Cells::Double(v) => v.push((!nullable).then_some(0.0)),
        }
        Ok(())
    }

    /// Removes the cell at `slot`, moving the last cell into its place.
    pub(crate) fn swap_remove(&mut self, slot: usize) {
        self.cells.swap_remove(slot);
    }

    /// Reads a scalar cell. List columns read as `Null`; use [`Column::list`].
    #[must_use]
    pub fn get(&self, slot: usize) -> Value {
        fn cell<T: Clone + Into<Value>>(cells: &[Option<T>], slot: usize) -> Value {
            cells
                .get(slot)
                .cloned()
                .flatten()
                .map_or(Value::Null, Into::into)
        }
        match &self.cells {
            Cells::Int(v) => cell(v, slot),
            Cells::Bool(v) => cell(v, slot),
            Cells::String(v) => cell(v, slot),
            Cells::Binary(v) => cell(v, slot),
            Cells::Timestamp(v) => cell(v, slot),
            Cells::Float(v) => cell(v, slot),
            Cells::Double(v) => cell(v, slot),
            Cells::Link(v) => cell(v, slot),
            Cells::List(_) => Value::Null,
        }
    }

    /// Reads a list cell.
    #[must_use]
    pub fn list(&self, slot: usize) -> Option<&[Value]> {
        match &self.cells {
            Cells::List(l) => l.get(slot).map(Vec::as_slice),
            _ => None,
        }
    }

    pub(crate) fn list_mut(&mut self, slot: usize) -> Option<&mut Vec<Value>> {
        match &mut self.cells {
            Cells::List(l) => l.get_mut(slot),
            _ => None,
        }
    }

    /// Validates a value for a scalar set on this column.
    pub(crate) fn check_scalar(&self, value: &Value, limits: &Limits) -> CoreResult<()> {
        if self.is_list() {
            return Err(CoreError::illegal_argument(format!(
                "Cannot set a single value on list column '{}'.",
                self.name()
            )));
        }
        self.check_cell(value, limits)
    }

    /// Validates one element for a list column.
    pub(crate) fn check_element(&self, value: &Value, limits: &Limits) -> CoreResult<()> {
        if !self.is_list() {
            return Err(CoreError::illegal_argument(format!(
                "Column '{}' is not a list.",
                self.name()
            )));
        }
        if value.is_null() && self.column_type() == ColumnType::LinkList {
            return Err(CoreError::illegal_argument(format!(
                "List({}) cannot contain null links.",
                self.name()
            )));
        }
        self.check_cell(value, limits)
    }

    fn check_cell(&self, value: &Value, limits: &Limits) -> CoreResult<()> {
        let Some(ty) = value.column_type() else {
            if self.is_nullable() {
                return Ok(());
            }
            return Err(CoreError::illegal_argument(format!(
                "This field({}) is not nullable.",
                self.name()
            )));
        };

        let expected = self.column_type().element_type();
        if ty != expected {
            return Err(CoreError::illegal_argument(format!(
                "Value of type {ty} cannot be stored in '{}' of type {expected}.",
                self.name()
            )));
        }

        match value {
            Value::String(s) if s.len() > limits.max_string_size => {
                Err(CoreError::illegal_argument(format!(
                    "The length of 'String' value in UTF8 encoding is {} which exceeds the max string length {} (field '{}').",
                    s.len(),
                    limits.max_string_size,
                    self.name()
                )))
            }
            Value::Binary(b) if b.len() > limits.max_binary_size => {
                Err(CoreError::illegal_argument(format!(
                    "The length of 'Binary' value is {} which exceeds the max binary length {} (field '{}').",
                    b.len(),
                    limits.max_binary_size,
                    self.name()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Stores a value already accepted by [`Column::check_scalar`].
    pub(crate) fn set(&mut self, slot: usize, value: Value) -> CoreResult<()> {
        let len = self.len();
        if slot >= len {
            return Err(CoreError::fatal(format!(
                "slot {slot} beyond column '{}' of length {len}",
                self.name()
            )));
        }
        let mismatch = || {
            CoreError::fatal(format!(
                "unchecked value reached column '{}'",
                self.spec.name()
            ))
        };
        match (&mut self.cells, value) {
            (Cells::Int(v), Value::Int(x)) => v[slot] = Some(x),
            (Cells::Int(v), Value::Null) => v[slot] = None,
            (Cells::Bool(v), Value::Bool(x)) => v[slot] = Some(x),
            (Cells::Bool(v), Value::Null) => v[slot] = None,
            (Cells::String(v), Value::String(x)) => v[slot] = Some(x),
            (Cells::String(v), Value::Null) => v[slot] = None,
            (Cells::Binary(v), Value::Binary(x)) => v[slot] = Some(x),
            (Cells::Binary(v), Value::Null) => v[slot] = None,
            (Cells::Timestamp(v), Value::Timestamp(x)) => v[slot] = Some(x),
            (Cells::Timestamp(v), Value::Null) => v[slot] = None,
            (Cells::Float(v), Value::Float(x)) => v[slot] = Some(x),
            (Cells::Float(v), Value::Null) => v[slot] = None,
            (Cells::Double(v), Value::Double(x)) => v[slot] = Some(x),
            (Cells::Double(v), Value::Null) => v[slot] = None,
            (Cells::Link(v), Value::Link(x)) => v[slot] = Some(x),
            (Cells::Link(v), Value::Null) => v[slot] = None,
            _ => return Err(mismatch()),
        }
        Ok(())
    }

    /// Slots whose scalar cell equals `value`, in slot order.
    pub(crate) fn matching_slots<'a>(
        &'a self,
        value: &'a Value,
    ) -> impl Iterator<Item = usize> + 'a {
        (0..self.len()).filter(move |&slot| !self.is_list() && self.get(slot) == *value)
    }

    /// Whether any cell links to `key`.
    pub(crate) fn links_to(&self, key: ObjKey) -> bool {
        match &self.cells {
            Cells::Link(v) if self.column_type() == ColumnType::Link => v.contains(&Some(key)),
            Cells::List(l) if self.column_type() == ColumnType::LinkList => l
                .iter()
                .any(|list| list.contains(&Value::Link(key))),
            _ => false,
        }
    }

    /// Clears links to `key`: link cells become null, link-list entries
    /// are removed. Returns how many references were dropped.
    pub(crate) fn unlink(&mut self, key: ObjKey) -> usize {
        let ty = self.column_type();
        let mut dropped = 0;
        match &mut self.cells {
            Cells::Link(v) if ty == ColumnType::Link => {
                for cell in v.iter_mut().filter(|c| **c == Some(key)) {
                    *cell = None;
                    dropped += 1;
                }
            }
            Cells::List(l) if ty == ColumnType::LinkList => {
                for list in l.iter_mut() {
                    let before = list.len();
                    list.retain(|v| *v != Value::Link(key));
                    dropped += before - list.len();
                }
            }
            _ => {}
        }
        dropped
    }
}
