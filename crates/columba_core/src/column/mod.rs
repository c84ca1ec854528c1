//! Columnar storage.
//!
//! A [`ColumnSpec`] fixes a column's type, nullability and list-ness at
//! creation; nothing can change them afterwards. A [`Column`] owns the
//! value array for one column of one table, indexed by row slot.

mod spec;
mod store;

pub use spec::ColumnSpec;
pub use store::Column;
