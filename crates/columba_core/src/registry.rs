//! Column type and nullability checks used before typed access.

use tracing::error;

use crate::error::{CoreError, CoreResult};
use crate::table::Table;
use crate::types::ColKey;
use crate::value::ColumnType;

/// Checks that `col` is declared with exactly `expected`.
///
/// # Errors
///
/// `IllegalArgument` if the column is unknown or its type differs.
pub fn type_valid(table: &Table, col: ColKey, expected: ColumnType) -> CoreResult<bool> {
    let column = table.require_column(col)?;
    let actual = column.column_type();
    if actual != expected {
        error!(
            "Expected columnType {}, but got {}.",
            expected.code(),
            actual.code()
        );
        return Err(CoreError::illegal_argument(format!(
            "ColumnType of '{}' is invalid.",
            column.name()
        )));
    }
    Ok(true)
}

/// Checks that `col` may hold null.
///
/// Link columns always may. List columns never do, whatever their element
/// nullability.
///
/// # Errors
///
/// `IllegalArgument` if the column is unknown, a list, or declared
/// non-nullable.
pub fn column_nullable(table: &Table, col: ColKey) -> CoreResult<bool> {
    let column = table.require_column(col)?;
    if column.column_type() == ColumnType::Link {
        return Ok(true);
    }
    if column.is_list() {
        return Err(CoreError::illegal_argument(format!(
            "List({}) is not nullable.",
            column.name()
        )));
    }
    if column.is_nullable() {
        return Ok(true);
    }
    error!("Expected nullable column type");
    Err(CoreError::illegal_argument(format!(
        "This field({}) is not nullable.",
        column.name()
    )))
}
