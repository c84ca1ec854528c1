//! Transactions.
//!
//! - [`ReadTransaction`]: pinned to one version until explicitly advanced.
//! - [`WriteTransaction`]: holds the single writer slot until it commits,
//!   rolls back, or is dropped.
//!
//! Both dereference to [`Transaction`], which carries the lookups common
//! to reading and writing.

mod manager;
mod read;
mod versions;
pub(crate) mod view;
mod write;

pub(crate) use manager::TransactionManager;
pub use read::ReadTransaction;
pub use write::{TransactionState, WriteTransaction};

use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::handle::{Anchor, Obj, TableRef};
use crate::types::{TableKey, TransactionId, VersionId};
use versions::VersionPin;
use view::View;

/// State shared by read and write transactions.
pub struct Transaction {
    view: Arc<View>,
    engine: Arc<TransactionManager>,
    pin: VersionPin,
}

impl Transaction {
    fn new(view: Arc<View>, engine: Arc<TransactionManager>, pin: VersionPin) -> Self {
        Self { view, engine, pin }
    }

    /// Transaction id.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.view.id()
    }

    /// Version the transaction currently sees. For a write transaction
    /// this is the version it started from.
    #[must_use]
    pub fn version(&self) -> VersionId {
        self.pin.version()
    }

    fn anchor(&self) -> Anchor {
        Anchor::new(&self.view)
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<TableRef> {
        let key = self.view.snapshot().table_by_name(name).map(|t| t.key())?;
        Some(TableRef::new(self.anchor(), key))
    }

    /// Looks up a table that must exist.
    ///
    /// # Errors
    ///
    /// `ClassNotFound` if there is no table called `name`.
    pub fn require_table(&self, name: &str) -> CoreResult<TableRef> {
        self.table(name).ok_or_else(|| CoreError::ClassNotFound {
            name: name.to_owned(),
        })
    }

    /// Looks up a table by key.
    #[must_use]
    pub fn table_by_key(&self, key: TableKey) -> Option<TableRef> {
        self.view.snapshot().table(key)?;
        Some(TableRef::new(self.anchor(), key))
    }

    /// Whether a table called `name` exists.
    #[must_use]
    pub fn has_table(&self, name: &str) -> bool {
        self.view.snapshot().table_by_name(name).is_some()
    }

    /// Table names in ascending order.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.view.snapshot().table_names()
    }

    /// Re-resolves a table handle from any transaction into this one.
    #[must_use]
    pub fn import_table(&self, table: &TableRef) -> Option<TableRef> {
        self.table_by_key(table.key())
    }

    /// Re-resolves an object handle from any transaction into this one.
    /// `None` if the table or the object does not exist here.
    #[must_use]
    pub fn import_object(&self, obj: &Obj) -> Option<Obj> {
        let snapshot = self.view.snapshot();
        let present = snapshot
            .table(obj.table_key())
            .is_some_and(|t| t.contains(obj.key()));
        present.then(|| Obj::new(self.anchor(), obj.table_key(), obj.key()))
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id())
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}
