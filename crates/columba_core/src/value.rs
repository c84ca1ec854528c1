//! Column types and cell values.

use crate::timestamp::Timestamp;
use crate::types::ObjKey;
use std::fmt;

/// Declared type of a column.
///
/// Discriminants match the type codes bindings pass across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColumnType {
    /// Signed 64-bit integer.
    Int = 0,
    /// Boolean.
    Bool = 1,
    /// UTF-8 string.
    String = 2,
    /// Raw bytes.
    Binary = 4,
    /// Seconds + nanoseconds timestamp.
    Timestamp = 8,
    /// 32-bit float.
    Float = 9,
    /// 64-bit float.
    Double = 10,
    /// Link to one object in a target table.
    Link = 12,
    /// Ordered list of links into a target table.
    LinkList = 13,
}

impl ColumnType {
    /// Parses a boundary type code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Int),
            1 => Some(Self::Bool),
            2 => Some(Self::String),
            4 => Some(Self::Binary),
            8 => Some(Self::Timestamp),
            9 => Some(Self::Float),
            10 => Some(Self::Double),
            12 => Some(Self::Link),
            13 => Some(Self::LinkList),
            _ => None,
        }
    }

    /// Boundary type code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Lower-case name used in messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Binary => "binary",
            Self::Timestamp => "timestamp",
            Self::Float => "float",
            Self::Double => "double",
            Self::Link => "link",
            Self::LinkList => "linklist",
        }
    }

    /// Whether values of this type point into another table.
    #[must_use]
    pub const fn is_link(self) -> bool {
        matches!(self, Self::Link | Self::LinkList)
    }

    /// Type of a single element stored under this column type.
    ///
    /// Only differs for [`ColumnType::LinkList`], whose elements are links.
    #[must_use]
    pub const fn element_type(self) -> Self {
        match self {
            Self::LinkList => Self::Link,
            other => other,
        }
    }

    /// Value written into non-nullable cells of a new row or column.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            Self::Int => Value::Int(0),
            Self::Bool => Value::Bool(false),
            Self::String => Value::String(String::new()),
            Self::Binary => Value::Binary(Vec::new()),
            Self::Timestamp => Value::Timestamp(Timestamp::default()),
            Self::Float => Value::Float(0.0),
            Self::Double => Value::Double(0.0),
            Self::Link | Self::LinkList => Value::Null,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value.
    Null,
    /// Integer.
    Int(i64),
    /// Boolean.
    Bool(bool),
    /// String.
    String(String),
    /// Bytes.
    Binary(Vec<u8>),
    /// Timestamp.
    Timestamp(Timestamp),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Link to an object.
    Link(ObjKey),
}

impl Value {
    /// The column type this value belongs to, or `None` for `Null`.
    #[must_use]
    pub const fn column_type(&self) -> Option<ColumnType> {
        match self {
            Self::Null => None,
            Self::Int(_) => Some(ColumnType::Int),
            Self::Bool(_) => Some(ColumnType::Bool),
            Self::String(_) => Some(ColumnType::String),
            Self::Binary(_) => Some(ColumnType::Binary),
            Self::Timestamp(_) => Some(ColumnType::Timestamp),
            Self::Float(_) => Some(ColumnType::Float),
            Self::Double(_) => Some(ColumnType::Double),
            Self::Link(_) => Some(ColumnType::Link),
        }
    }

    /// Whether this is `Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Integer payload.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean payload.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Binary payload.
    #[must_use]
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(v) => Some(v),
            _ => None,
        }
    }

    /// Timestamp payload.
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Float payload.
    #[must_use]
    pub const fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Double payload.
    #[must_use]
    pub const fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Link payload.
    #[must_use]
    pub const fn as_link(&self) -> Option<ObjKey> {
        match self {
            Self::Link(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Binary(v) => write!(f, "<{} bytes>", v.len()),
            Self::Timestamp(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Link(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(v)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Self::Timestamp(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<ObjKey> for Value {
    fn from(v: ObjKey) -> Self {
        Self::Link(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_round_trip() {
        for ty in [
            ColumnType::Int,
            ColumnType::Bool,
            ColumnType::String,
            ColumnType::Binary,
            ColumnType::Timestamp,
            ColumnType::Float,
            ColumnType::Double,
            ColumnType::Link,
            ColumnType::LinkList,
        ] {
            assert_eq!(ColumnType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(ColumnType::from_code(3), None);
        assert_eq!(ColumnType::from_code(-1), None);
    }

    #[test]
    fn value_types() {
        assert_eq!(Value::from(5i64).column_type(), Some(ColumnType::Int));
        assert_eq!(Value::from("x").column_type(), Some(ColumnType::String));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(true)), Value::Bool(true));
        assert_eq!(Value::Null.column_type(), None);
        assert_eq!(
            Value::from(ObjKey::new(3)).column_type(),
            Some(ColumnType::Link)
        );
    }

    #[test]
    fn link_list_elements_are_links() {
        assert_eq!(ColumnType::LinkList.element_type(), ColumnType::Link);
        assert_eq!(ColumnType::Int.element_type(), ColumnType::Int);
        assert!(ColumnType::LinkList.is_link());
        assert!(!ColumnType::Binary.is_link());
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Int(4).as_int(), Some(4));
        assert_eq!(Value::Int(4).as_bool(), None);
        assert_eq!(Value::from("abc").as_str(), Some("abc"));
        assert_eq!(Value::Binary(vec![1]).as_binary(), Some(&[1u8][..]));
        assert_eq!(Value::Double(1.5).as_double(), Some(1.5));
    }
}
