//! Column declarations.

use crate::error::{CoreError, CoreResult};
use crate::types::TableKey;
use crate::value::ColumnType;

/// Immutable declaration of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    name: String,
    ty: ColumnType,
    nullable: bool,
    list: bool,
    target: Option<TableKey>,
}

impl ColumnSpec {
    /// Declares a column of `ty`.
    ///
    /// For list columns `nullable` applies to the elements; the list itself
    /// is never null.
    pub fn new(name: impl Into<String>, ty: ColumnType, nullable: bool, list: bool) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable,
            list: list || ty == ColumnType::LinkList,
            target: None,
        }
    }

    /// Declares a single-value column.
    pub fn scalar(name: impl Into<String>, ty: ColumnType, nullable: bool) -> Self {
        Self::new(name, ty, nullable, false)
    }

    /// Declares a list of primitive values.
    pub fn list(name: impl Into<String>, element: ColumnType, nullable_elements: bool) -> Self {
        Self::new(name, element, nullable_elements, true)
    }

    /// Declares a link column. Links are always nullable.
    pub fn link(name: impl Into<String>, target: TableKey) -> Self {
        Self {
            name: name.into(),
            ty: ColumnType::Link,
            nullable: true,
            list: false,
            target: Some(target),
        }
    }

    /// Declares a link-list column. Link lists are never nullable.
    pub fn link_list(name: impl Into<String>, target: TableKey) -> Self {
        Self {
            name: name.into(),
            ty: ColumnType::LinkList,
            nullable: false,
            list: true,
            target: Some(target),
        }
    }

    /// Sets the link target of a link or link-list column.
    #[must_use]
    pub fn with_target(mut self, target: TableKey) -> Self {
        self.target = Some(target);
        self
    }

    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        self.ty
    }

    /// Declared nullability (of the elements, for lists).
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Whether the column holds a list per row.
    #[must_use]
    pub const fn is_list(&self) -> bool {
        self.list
    }

    /// Link target table, for link and link-list columns.
    #[must_use]
    pub const fn target(&self) -> Option<TableKey> {
        self.target
    }

    /// Checks the declaration is self-consistent.
    pub(crate) fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::illegal_argument("Column name must not be empty."));
        }
        match (self.ty.is_link(), self.target) {
            (true, None) => {
                return Err(CoreError::illegal_argument(format!(
                    "Link column '{}' needs a target table.",
                    self.name
                )));
            }
            (false, Some(_)) => {
                return Err(CoreError::illegal_argument(format!(
                    "Column '{}' of type {} cannot have a link target.",
                    self.name, self.ty
                )));
            }
            _ => {}
        }
        if self.ty == ColumnType::Link && self.list {
            return Err(CoreError::illegal_argument(format!(
                "Column '{}': use a linklist column for lists of links.",
                self.name
            )));
        }
        if self.ty == ColumnType::Link && !self.nullable {
            return Err(CoreError::illegal_argument(format!(
                "Link column '{}' is always nullable.",
                self.name
            )));
        }
        if self.ty == ColumnType::LinkList && self.nullable {
            return Err(CoreError::illegal_argument(format!(
                "List({}) is not nullable.",
                self.name
            )));
        }
        Ok(())
    }
}
