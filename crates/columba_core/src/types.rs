//! Identifier types shared across the engine.
//!
//! Keys cross the binding boundary as signed 64-bit integers. `-1` is
//! reserved as the "not found" sentinel and is never a valid key.

use std::fmt;

/// Raw value returned across the boundary when a lookup finds nothing.
pub const NOT_FOUND: i64 = -1;

/// Identifies a table within a database.
///
/// Table keys are allocated monotonically and never reused, so a key that
/// outlives its table can never alias a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableKey(pub u32);

impl TableKey {
    /// Creates a table key.
    #[must_use]
    pub const fn new(key: u32) -> Self {
        Self(key)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table:{}", self.0)
    }
}

/// Identifies a column within a table.
///
/// `ColKey(0)` is the invalid sentinel. Keys are allocated per table from 1
/// upward, stay stable when other columns are added or removed, and are
/// never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColKey(pub i64);

impl ColKey {
    /// The invalid column key.
    pub const INVALID: Self = Self(0);

    /// Creates a column key.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Whether this is a usable key, i.e. not the invalid sentinel.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for ColKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "col:{}", self.0)
    }
}

/// Identifies a row ("object") within a table.
///
/// Valid keys are `>= 0`. Keys are allocated monotonically per table
/// lineage; a removed key is never handed out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjKey(pub i64);

impl ObjKey {
    /// Creates an object key.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    /// Parses a raw boundary value. Negative values (including the
    /// [`NOT_FOUND`] sentinel) yield `None`.
    #[must_use]
    pub const fn from_raw(raw: i64) -> Option<Self> {
        if raw >= 0 {
            Some(Self(raw))
        } else {
            None
        }
    }
}

impl fmt::Display for ObjKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj:{}", self.0)
    }
}

/// Converts an optional key into its boundary form.
pub trait OrNotFound {
    /// The raw key, or [`NOT_FOUND`] when absent.
    fn or_not_found(self) -> i64;
}

impl OrNotFound for Option<ObjKey> {
    fn or_not_found(self) -> i64 {
        self.map_or(NOT_FOUND, ObjKey::value)
    }
}

impl OrNotFound for Option<ColKey> {
    fn or_not_found(self) -> i64 {
        match self {
            Some(key) if key.is_valid() => key.value(),
            _ => NOT_FOUND,
        }
    }
}

impl OrNotFound for Option<usize> {
    fn or_not_found(self) -> i64 {
        self.and_then(|i| i64::try_from(i).ok())
            .unwrap_or(NOT_FOUND)
    }
}

/// Number of a committed version.
///
/// Version 0 is the empty database. Every successful commit produces the
/// next number; the sequence has no gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VersionId(pub u64);

impl VersionId {
    /// The version of a freshly created database.
    pub const INITIAL: Self = Self(0);

    /// Creates a version id.
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following version.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identifies a transaction for logging and handle bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a transaction id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}
