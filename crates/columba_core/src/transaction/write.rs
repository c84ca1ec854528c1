use std::ops::Deref;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::handle::TableRef;
use crate::history::Instruction;
use crate::snapshot::Snapshot;
use crate::transaction::manager::WriterSlot;
use crate::transaction::view::ViewMode;
use crate::transaction::{ReadTransaction, Transaction, TransactionManager};
use crate::types::VersionId;

/// Lifecycle of a write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Open for writes.
    Active,
    /// Changes are published.
    Committed,
    /// Changes were discarded.
    RolledBack,
}

/// The single write transaction.
///
/// Mutations are applied to a private copy of the snapshot and published
/// atomically by [`WriteTransaction::commit`]. Dropping an active write
/// transaction rolls it back.
#[derive(Debug)]
pub struct WriteTransaction {
    inner: Transaction,
    slot: Option<WriterSlot>,
    state: TransactionState,
    handed_off: bool,
}

impl WriteTransaction {
    pub(crate) fn begin(engine: &Arc<TransactionManager>, slot: WriterSlot) -> Self {
        let (view, pin) = engine.open_view(ViewMode::Write);
        engine.stats().record_write_begin();
        debug!(txn = %view.id(), version = %pin.version(), "write transaction started");
        Self {
            inner: Transaction::new(view, Arc::clone(engine), pin),
            slot: Some(slot),
            state: TransactionState::Active,
            handed_off: false,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(CoreError::illegal_state(
                "The write transaction has already been committed.",
            )),
            TransactionState::RolledBack => Err(CoreError::illegal_state(
                "The write transaction has already been rolled back.",
            )),
        }
    }

    /// Creates a table.
    ///
    /// # Errors
    ///
    /// `IllegalArgument` if the name is empty or taken.
    pub fn add_table(&self, name: &str) -> CoreResult<TableRef> {
        self.ensure_active()?;
        let view = &self.inner.view;
        let instruction = view
            .write(view.generation(), |snap| {
                Ok(Instruction::AddTable {
                    table: snap.next_table_key(),
                    name: name.to_owned(),
                })
            })
            .ok_or_else(CoreError::table_invalid)??;
        let Instruction::AddTable { table, .. } = instruction else {
            return Err(CoreError::fatal("add_table recorded a different instruction"));
        };
        Ok(TableRef::new(self.inner.anchor(), table))
    }

    /// Returns the named table, creating it if needed.
    pub fn get_or_add_table(&self, name: &str) -> CoreResult<TableRef> {
        match self.inner.table(name) {
            Some(table) => Ok(table),
            None => self.add_table(name),
        }
    }

    /// Removes a table.
    ///
    /// # Errors
    ///
    /// `ClassNotFound` if it does not exist, `IllegalArgument` if another
    /// table links to it.
    pub fn remove_table(&self, name: &str) -> CoreResult<()> {
        self.ensure_active()?;
        let table = self.inner.require_table(name)?.key();
        let view = &self.inner.view;
        view.write(view.generation(), |_| Ok(Instruction::RemoveTable { table }))
            .ok_or_else(CoreError::table_invalid)??;
        Ok(())
    }

    /// Number of mutations recorded so far.
    #[must_use]
    pub fn pending_changes(&self) -> usize {
        self.inner.view.change_count()
    }

    /// Publishes all changes as the next version.
    ///
    /// Every commit produces a new version, even one without changes.
    /// All handles obtained from this transaction become invalid.
    ///
    /// # Errors
    ///
    /// `IllegalState` if the transaction has ended. If the history log
    /// cannot be written the transaction is rolled back and the write
    /// error returned.
    pub fn commit(&mut self) -> CoreResult<VersionId> {
        let committed = self.commit_inner()?;
        self.inner.view.replace(committed.clone(), ViewMode::Closed, true);
        Ok(committed.version())
    }

    fn commit_inner(&mut self) -> CoreResult<Arc<Snapshot>> {
        self.ensure_active()?;
        let changes = self.inner.view.take_changes();
        let working = self.inner.view.snapshot();
        match self.inner.engine.commit(&working, changes) {
            Ok(committed) => {
                self.state = TransactionState::Committed;
                self.slot = None;
                Ok(committed)
            }
            Err(err) => {
                warn!(txn = %self.inner.id(), error = %err, "commit failed; rolling back");
                self.abort();
                Err(err)
            }
        }
    }

    /// Commits and keeps reading at the committed version.
    ///
    /// Handles obtained from this transaction stay valid and become
    /// read-only.
    pub fn commit_and_continue_as_read(mut self) -> CoreResult<ReadTransaction> {
        let committed = self.commit_inner()?;
        let version = committed.version();
        let view = Arc::clone(&self.inner.view);
        view.replace(committed, ViewMode::Read, false);
        let pin = self.inner.engine.pin(version);
        self.handed_off = true;
        Ok(ReadTransaction::from_parts(
            view,
            Arc::clone(&self.inner.engine),
            pin,
        ))
    }

    /// Discards all changes.
    ///
    /// # Errors
    ///
    /// `IllegalState` if the transaction has already ended.
    pub fn rollback(&mut self) -> CoreResult<()> {
        self.ensure_active()?;
        self.abort();
        Ok(())
    }

    fn abort(&mut self) {
        self.inner.view.close();
        self.state = TransactionState::RolledBack;
        self.slot = None;
        self.inner.engine.stats().record_rollback();
        debug!(txn = %self.inner.id(), "write transaction rolled back");
    }
}

impl Deref for WriteTransaction {
    type Target = Transaction;

    fn deref(&self) -> &Transaction {
        &self.inner
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            self.abort();
        }
        if !self.handed_off {
            self.inner.view.close();
        }
    }
}
