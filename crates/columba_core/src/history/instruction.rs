//! Change-set instructions and their binary payload encoding.
//!
//! Every mutation a write transaction performs is captured as one
//! [`Instruction`]. The same instructions drive both live writes and
//! history replay, so a replayed commit reproduces the committed state
//! exactly, including the keys that were allocated.

use crate::column::ColumnSpec;
use crate::error::{CoreError, CoreResult};
use crate::timestamp::Timestamp;
use crate::types::{ColKey, ObjKey, TableKey};
use crate::value::{ColumnType, Value};

/// One recorded mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Add a table.
    AddTable {
        /// Allocated key.
        table: TableKey,
        /// Table name.
        name: String,
    },
    /// Remove a table.
    RemoveTable {
        /// Table key.
        table: TableKey,
    },
    /// Add a column.
    AddColumn {
        /// Table key.
        table: TableKey,
        /// Allocated column key.
        col: ColKey,
        /// Declaration.
        spec: ColumnSpec,
    },
    /// Remove a column.
    RemoveColumn {
        /// Table key.
        table: TableKey,
        /// Column key.
        col: ColKey,
    },
    /// Create an object.
    CreateObject {
        /// Table key.
        table: TableKey,
        /// Allocated object key.
        key: ObjKey,
    },
    /// Remove an object and every link pointing at it.
    RemoveObject {
        /// Table key.
        table: TableKey,
        /// Object key.
        key: ObjKey,
    },
    /// Set a scalar value.
    Set {
        /// Table key.
        table: TableKey,
        /// Object key.
        key: ObjKey,
        /// Column key.
        col: ColKey,
        /// New value.
        value: Value,
    },
    /// Insert into a list.
    ListInsert {
        /// Table key.
        table: TableKey,
        /// Object key.
        key: ObjKey,
        /// Column key.
        col: ColKey,
        /// Position.
        index: usize,
        /// Element.
        value: Value,
    },
    /// Replace a list element.
    ListSet {
        /// Table key.
        table: TableKey,
        /// Object key.
        key: ObjKey,
        /// Column key.
        col: ColKey,
        /// Position.
        index: usize,
        /// Element.
        value: Value,
    },
    /// Remove a list element.
    ListRemove {
        /// Table key.
        table: TableKey,
        /// Object key.
        key: ObjKey,
        /// Column key.
        col: ColKey,
        /// Position.
        index: usize,
    },
    /// Empty a list.
    ListClear {
        /// Table key.
        table: TableKey,
        /// Object key.
        key: ObjKey,
        /// Column key.
        col: ColKey,
    },
}

const OP_ADD_TABLE: u8 = 1;
const OP_REMOVE_TABLE: u8 = 2;
const OP_ADD_COLUMN: u8 = 3;
const OP_REMOVE_COLUMN: u8 = 4;
const OP_CREATE_OBJECT: u8 = 5;
const OP_REMOVE_OBJECT: u8 = 6;
const OP_SET: u8 = 7;
const OP_LIST_INSERT: u8 = 8;
const OP_LIST_SET: u8 = 9;
const OP_LIST_REMOVE: u8 = 10;
const OP_LIST_CLEAR: u8 = 11;

const TAG_NULL: u8 = 0xFF;

const FLAG_NULLABLE: u8 = 0b001;
const FLAG_LIST: u8 = 0b010;
const FLAG_TARGET: u8 = 0b100;

impl Instruction {
    /// Short operation name, used by diagnostics.
    #[must_use]
    pub const fn op_name(&self) -> &'static str {
        match self {
            Self::AddTable { .. } => "add_table",
            Self::RemoveTable { .. } => "remove_table",
            Self::AddColumn { .. } => "add_column",
            Self::RemoveColumn { .. } => "remove_column",
            Self::CreateObject { .. } => "create_object",
            Self::RemoveObject { .. } => "remove_object",
            Self::Set { .. } => "set",
            Self::ListInsert { .. } => "list_insert",
            Self::ListSet { .. } => "list_set",
            Self::ListRemove { .. } => "list_remove",
            Self::ListClear { .. } => "list_clear",
        }
    }

    /// Appends the binary form of this instruction to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Self::AddTable { table, name } => {
                buf.push(OP_ADD_TABLE);
                put_table(buf, *table);
                put_str(buf, name);
            }
            Self::RemoveTable { table } => {
                buf.push(OP_REMOVE_TABLE);
                put_table(buf, *table);
            }
            Self::AddColumn { table, col, spec } => {
                buf.push(OP_ADD_COLUMN);
                put_table(buf, *table);
                put_i64(buf, col.value());
                put_spec(buf, spec);
            }
            Self::RemoveColumn { table, col } => {
                buf.push(OP_REMOVE_COLUMN);
                put_table(buf, *table);
                put_i64(buf, col.value());
            }
            Self::CreateObject { table, key } => {
                buf.push(OP_CREATE_OBJECT);
                put_table(buf, *table);
                put_i64(buf, key.value());
            }
            Self::RemoveObject { table, key } => {
                buf.push(OP_REMOVE_OBJECT);
                put_table(buf, *table);
                put_i64(buf, key.value());
            }
            Self::Set {
                table,
                key,
                col,
                value,
            } => {
                buf.push(OP_SET);
                put_cell(buf, *table, *key, *col);
                put_value(buf, value);
            }
            Self::ListInsert {
                table,
                key,
                col,
                index,
                value,
            } => {
                buf.push(OP_LIST_INSERT);
                put_cell(buf, *table, *key, *col);
                put_u64(buf, *index as u64);
                put_value(buf, value);
            }
            Self::ListSet {
                table,
                key,
                col,
                index,
                value,
            } => {
                buf.push(OP_LIST_SET);
                put_cell(buf, *table, *key, *col);
                put_u64(buf, *index as u64);
                put_value(buf, value);
            }
            Self::ListRemove {
                table,
                key,
                col,
                index,
            } => {
                buf.push(OP_LIST_REMOVE);
                put_cell(buf, *table, *key, *col);
                put_u64(buf, *index as u64);
            }
            Self::ListClear { table, key, col } => {
                buf.push(OP_LIST_CLEAR);
                put_cell(buf, *table, *key, *col);
            }
        }
    }

    /// Decodes one instruction from the reader.
    pub(crate) fn decode(r: &mut PayloadReader<'_>) -> CoreResult<Self> {
        let op = r.u8()?;
        let instruction = match op {
            OP_ADD_TABLE => Self::AddTable {
                table: r.table()?,
                name: r.string()?,
            },
            OP_REMOVE_TABLE => Self::RemoveTable { table: r.table()? },
            OP_ADD_COLUMN => Self::AddColumn {
                table: r.table()?,
                col: ColKey::new(r.i64()?),
                spec: r.spec()?,
            },
            OP_REMOVE_COLUMN => Self::RemoveColumn {
                table: r.table()?,
                col: ColKey::new(r.i64()?),
            },
            OP_CREATE_OBJECT => Self::CreateObject {
                table: r.table()?,
                key: r.obj()?,
            },
            OP_REMOVE_OBJECT => Self::RemoveObject {
                table: r.table()?,
                key: r.obj()?,
            },
            OP_SET => Self::Set {
                table: r.table()?,
                key: r.obj()?,
                col: ColKey::new(r.i64()?),
                value: r.value()?,
            },
            OP_LIST_INSERT => Self::ListInsert {
                table: r.table()?,
                key: r.obj()?,
                col: ColKey::new(r.i64()?),
                index: r.index()?,
                value: r.value()?,
            },
            OP_LIST_SET => Self::ListSet {
                table: r.table()?,
                key: r.obj()?,
                col: ColKey::new(r.i64()?),
                index: r.index()?,
                value: r.value()?,
            },
            OP_LIST_REMOVE => Self::ListRemove {
                table: r.table()?,
                key: r.obj()?,
                col: ColKey::new(r.i64()?),
                index: r.index()?,
            },
            OP_LIST_CLEAR => Self::ListClear {
                table: r.table()?,
                key: r.obj()?,
                col: ColKey::new(r.i64()?),
            },
            other => return Err(r.corrupt(format!("unknown instruction opcode {other}"))),
        };
        Ok(instruction)
    }
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_table(buf: &mut Vec<u8>, table: TableKey) {
    buf.extend_from_slice(&table.as_u32().to_le_bytes());
}

fn put_cell(buf: &mut Vec<u8>, table: TableKey, key: ObjKey, col: ColKey) {
    put_table(buf, table);
    put_i64(buf, key.value());
    put_i64(buf, col.value());
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_u64(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_bytes(buf, s.as_bytes());
}

fn put_spec(buf: &mut Vec<u8>, spec: &ColumnSpec) {
    put_str(buf, spec.name());
    buf.push(spec.column_type().code() as u8);
    let mut flags = 0;
    if spec.is_nullable() {
        flags |= FLAG_NULLABLE;
    }
    if spec.is_list() {
        flags |= FLAG_LIST;
    }
    if spec.target().is_some() {
        flags |= FLAG_TARGET;
    }
    buf.push(flags);
    if let Some(target) = spec.target() {
        put_table(buf, target);
    }
}

fn put_value(buf: &mut Vec<u8>, value: &Value) {
    let Some(ty) = value.column_type() else {
        buf.push(TAG_NULL);
        return;
    };
    buf.push(ty.code() as u8);
    match value {
        Value::Null => {}
        Value::Int(v) => put_i64(buf, *v),
        Value::Bool(v) => buf.push(u8::from(*v)),
        Value::String(v) => put_str(buf, v),
        Value::Binary(v) => put_bytes(buf, v),
        Value::Timestamp(v) => {
            put_i64(buf, v.seconds());
            buf.extend_from_slice(&v.nanoseconds().to_le_bytes());
        }
        Value::Float(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Double(v) => buf.extend_from_slice(&v.to_le_bytes()),
        Value::Link(v) => put_i64(buf, v.value()),
    }
}

/// Bounds-checked little-endian reader over a record payload.
///
/// Errors carry the offset of the record being decoded.
pub(crate) struct PayloadReader<'a> {
    payload: &'a [u8],
    cursor: usize,
    record_offset: u64,
}

impl<'a> PayloadReader<'a> {
    pub(crate) fn new(payload: &'a [u8], record_offset: u64) -> Self {
        Self {
            payload,
            cursor: 0,
            record_offset,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cursor == self.payload.len()
    }

    pub(crate) fn corrupt(&self, message: impl Into<String>) -> CoreError {
        CoreError::history_corruption(self.record_offset, message)
    }

    fn take(&mut self, n: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .cursor
            .checked_add(n)
            .filter(|&end| end <= self.payload.len())
            .ok_or_else(|| self.corrupt("unexpected end of payload"))?;
        let payload = self.payload;
        let bytes = &payload[self.cursor..end];
        self.cursor = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> CoreResult<[u8; N]> {
        let bytes = self.take(N)?;
        bytes
            .try_into()
            .map_err(|_| self.corrupt("short field"))
    }

    pub(crate) fn u8(&mut self) -> CoreResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn u32(&mut self) -> CoreResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> CoreResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> CoreResult<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> CoreResult<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn index(&mut self) -> CoreResult<usize> {
        let raw = self.u64()?;
        usize::try_from(raw).map_err(|_| self.corrupt(format!("list index {raw} out of range")))
    }

    fn table(&mut self) -> CoreResult<TableKey> {
        Ok(TableKey::new(self.u32()?))
    }

    fn obj(&mut self) -> CoreResult<ObjKey> {
        let raw = self.i64()?;
        ObjKey::from_raw(raw).ok_or_else(|| self.corrupt(format!("negative object key {raw}")))
    }

    fn bytes(&mut self) -> CoreResult<Vec<u8>> {
        let len = self.index()?;
        Ok(self.take(len)?.to_vec())
    }

    fn string(&mut self) -> CoreResult<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes).map_err(|_| self.corrupt("string is not valid UTF-8"))
    }

    fn column_type(&mut self) -> CoreResult<ColumnType> {
        let code = self.u8()?;
        ColumnType::from_code(i32::from(code))
            .ok_or_else(|| self.corrupt(format!("unknown column type {code}")))
    }

    fn spec(&mut self) -> CoreResult<ColumnSpec> {
        let name = self.string()?;
        let ty = self.column_type()?;
        let flags = self.u8()?;
        let mut spec = ColumnSpec::new(
            name,
            ty,
            flags & FLAG_NULLABLE != 0,
            flags & FLAG_LIST != 0,
        );
        if flags & FLAG_TARGET != 0 {
            spec = spec.with_target(self.table()?);
        }
        Ok(spec)
    }

    fn value(&mut self) -> CoreResult<Value> {
        let tag = self.u8()?;
        if tag == TAG_NULL {
            return Ok(Value::Null);
        }
        let ty = ColumnType::from_code(i32::from(tag))
            .ok_or_else(|| self.corrupt(format!("unknown value tag {tag}")))?;
        let value = match ty {
            ColumnType::Int => Value::Int(self.i64()?),
            ColumnType::Bool => Value::Bool(self.u8()? != 0),
            ColumnType::String => Value::String(self.string()?),
            ColumnType::Binary => Value::Binary(self.bytes()?),
            ColumnType::Timestamp => {
                let seconds = self.i64()?;
                let nanos = self.i32()?;
                let ts = Timestamp::new(seconds, nanos)
                    .map_err(|e| self.corrupt(e.to_string()))?;
                Value::Timestamp(ts)
            }
            ColumnType::Float => Value::Float(f32::from_le_bytes(self.array()?)),
            ColumnType::Double => Value::Double(f64::from_le_bytes(self.array()?)),
            ColumnType::Link => Value::Link(self.obj()?),
            ColumnType::LinkList => return Err(self.corrupt("link list is not a value type")),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(instruction: &Instruction) -> Instruction {
        let mut buf = Vec::new();
        instruction.encode_into(&mut buf);
        let mut r = PayloadReader::new(&buf, 0);
        let decoded = Instruction::decode(&mut r).unwrap();
        assert!(r.is_empty());
        decoded
    }

    #[test]
    fn schema_instructions() {
        let table = TableKey::new(4);
        let add = Instruction::AddColumn {
            table,
            col: ColKey::new(7),
            spec: ColumnSpec::link("owner", TableKey::new(2)),
        };
        assert_eq!(round_trip(&add), add);
        let list = Instruction::AddColumn {
            table,
            col: ColKey::new(8),
            spec: ColumnSpec::list("tags", ColumnType::String, true),
        };
        assert_eq!(round_trip(&list), list);
    }

    #[test]
    fn value_instructions() {
        let ts = Timestamp::from_milliseconds(-1500);
        let set = Instruction::Set {
            table: TableKey::new(1),
            key: ObjKey::new(3),
            col: ColKey::new(9),
            value: Value::Timestamp(ts),
        };
        assert_eq!(round_trip(&set), set);
        let insert = Instruction::ListInsert {
            table: TableKey::new(1),
            key: ObjKey::new(3),
            col: ColKey::new(9),
            index: 2,
            value: Value::Null,
        };
        assert_eq!(round_trip(&insert), insert);
    }

    #[test]
    fn truncated_payload_is_corruption() {
        let mut buf = Vec::new();
        Instruction::AddTable {
            table: TableKey::new(1),
            name: "person".into(),
        }
        .encode_into(&mut buf);
        buf.truncate(buf.len() - 2);
        let err = Instruction::decode(&mut PayloadReader::new(&buf, 42)).unwrap_err();
        assert!(matches!(err, CoreError::HistoryCorruption { offset: 42, .. }));
    }

    #[test]
    fn unknown_opcode_rejected() {
        let err = Instruction::decode(&mut PayloadReader::new(&[200], 0)).unwrap_err();
        assert!(err.to_string().contains("opcode 200"));
    }
}
