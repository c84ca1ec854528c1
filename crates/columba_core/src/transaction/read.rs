use std::ops::Deref;
use std::sync::Arc;

use tracing::debug;

use crate::transaction::view::{View, ViewMode};
use crate::transaction::{Transaction, TransactionManager, VersionPin};

/// A read-only transaction pinned to one version.
///
/// Handles obtained from it stay valid until [`ReadTransaction::advance`]
/// moves it to a newer version or it is dropped.
#[derive(Debug)]
pub struct ReadTransaction {
    inner: Transaction,
}

impl ReadTransaction {
    pub(crate) fn begin(engine: &Arc<TransactionManager>) -> Self {
        let (view, pin) = engine.open_view(ViewMode::Read);
        engine.stats().record_read_begin();
        Self::from_parts(view, Arc::clone(engine), pin)
    }

    pub(crate) fn from_parts(
        view: Arc<View>,
        engine: Arc<TransactionManager>,
        pin: VersionPin,
    ) -> Self {
        Self {
            inner: Transaction::new(view, engine, pin),
        }
    }

    /// Moves to the newest committed version.
    ///
    /// If a newer version exists, every handle obtained from this
    /// transaction becomes invalid. Returns whether the version changed.
    pub fn advance(&mut self) -> bool {
        let from = self.inner.pin.version();
        let Some(latest) = self.inner.engine.advance_pin(&mut self.inner.pin) else {
            return false;
        };
        let to = latest.version();
        self.inner.view.replace(latest, ViewMode::Read, true);
        self.inner.engine.stats().record_advance();
        debug!(txn = %self.inner.id(), %from, %to, "read transaction advanced");
        true
    }
}

impl Deref for ReadTransaction {
    type Target = Transaction;

    fn deref(&self) -> &Transaction {
        &self.inner
    }
}

impl Drop for ReadTransaction {
    fn drop(&mut self) {
        self.inner.view.close();
    }
}
