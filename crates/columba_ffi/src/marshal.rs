//! Conversions between boundary representations and engine values.

use columba_core::{CoreError, Timestamp, Value};

use crate::error::FfiResult;

/// Prefix that maps class names onto table names.
pub const TABLE_PREFIX: &str = "class_";

/// Table name for a class name.
pub fn class_to_table_name(class: &str) -> String {
    format!("{TABLE_PREFIX}{class}")
}

/// Class name for a table name, if the table follows the prefix convention.
pub fn table_to_class_name(table: &str) -> Option<&str> {
    table.strip_prefix(TABLE_PREFIX)
}

/// Borrowed string argument of known byte length, possibly null.
#[derive(Debug, Clone, Copy)]
pub struct StringAccessor<'a> {
    bytes: Option<&'a [u8]>,
}

impl<'a> StringAccessor<'a> {
    /// Wraps a byte slice; `None` stands for a null string.
    pub const fn new(bytes: Option<&'a [u8]>) -> Self {
        Self { bytes }
    }

    /// A null string.
    pub const fn null() -> Self {
        Self { bytes: None }
    }

    /// Whether the string is null.
    pub const fn is_null(&self) -> bool {
        self.bytes.is_none()
    }

    /// Whether the string is null or has no bytes.
    pub fn is_null_or_empty(&self) -> bool {
        self.bytes.map_or(true, <[u8]>::is_empty)
    }

    /// Length in UTF-8 bytes; zero when null.
    pub fn len(&self) -> usize {
        self.bytes.map_or(0, <[u8]>::len)
    }

    /// Validates UTF-8 and the size limit.
    ///
    /// Null maps to `None`.
    pub fn to_str(&self, max_string_size: usize) -> FfiResult<Option<&'a str>> {
        let Some(bytes) = self.bytes else {
            return Ok(None);
        };
        if bytes.len() > max_string_size {
            return Err(CoreError::illegal_argument(format!(
                "The length of 'String' value in UTF8 encoding is {} which exceeds the max string length {}.",
                bytes.len(),
                max_string_size
            ))
            .into());
        }
        Ok(Some(std::str::from_utf8(bytes)?))
    }

    /// Converts into an engine value; null becomes [`Value::Null`].
    pub fn to_value(&self, max_string_size: usize) -> FfiResult<Value> {
        Ok(self
            .to_str(max_string_size)?
            .map_or(Value::Null, Value::from))
    }
}

/// Boundary milliseconds for an engine timestamp.
pub const fn to_milliseconds(ts: Timestamp) -> i64 {
    ts.to_milliseconds()
}

/// Engine timestamp for boundary milliseconds.
pub const fn from_milliseconds(milliseconds: i64) -> Timestamp {
    Timestamp::from_milliseconds(milliseconds)
}

/// Boundary boolean.
pub const fn to_bool(b: u8) -> bool {
    b != 0
}

/// Boundary boolean.
pub const fn from_bool(b: bool) -> u8 {
    b as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use columba_core::{ErrorKind, DEFAULT_MAX_STRING_SIZE};

    #[test]
    fn class_prefix() {
        assert_eq!(class_to_table_name("Person"), "class_Person");
        assert_eq!(table_to_class_name("class_Person"), Some("Person"));
        assert_eq!(table_to_class_name("metadata"), None);
    }

    #[test]
    fn null_and_empty() {
        let null = StringAccessor::null();
        assert!(null.is_null());
        assert!(null.is_null_or_empty());
        assert_eq!(null.to_value(DEFAULT_MAX_STRING_SIZE).unwrap(), Value::Null);

        let empty = StringAccessor::new(Some(b""));
        assert!(!empty.is_null());
        assert!(empty.is_null_or_empty());
        assert_eq!(empty.to_value(10).unwrap(), Value::from(""));
    }

    #[test]
    fn multibyte_length_is_in_bytes() {
        let s = "h\u{e9}llo";
        let acc = StringAccessor::new(Some(s.as_bytes()));
        assert_eq!(acc.len(), 6);
        assert_eq!(acc.to_str(6).unwrap(), Some(s));

        let err = acc.to_str(5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalArgument);
        assert_eq!(
            err.to_string(),
            "The length of 'String' value in UTF8 encoding is 6 which exceeds the max string length 5."
        );
    }

    #[test]
    fn invalid_utf8_rejected() {
        let acc = StringAccessor::new(Some(&[0xFF, 0xFE]));
        assert_eq!(acc.to_str(10).unwrap_err().kind(), ErrorKind::IllegalArgument);
    }

    #[test]
    fn milliseconds() {
        let ts = from_milliseconds(-1_500);
        assert_eq!(ts.seconds(), -1);
        assert_eq!(ts.nanoseconds(), -500_000_000);
        assert_eq!(to_milliseconds(ts), -1_500);
        assert_eq!(to_milliseconds(from_milliseconds(i64::MAX)), i64::MAX);
    }

    #[test]
    fn booleans() {
        assert!(to_bool(1));
        assert!(to_bool(2));
        assert!(!to_bool(0));
        assert_eq!(from_bool(true), 1);
    }
}
