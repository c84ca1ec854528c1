//! Transaction manager.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::debug;

use crate::config::Limits;
use crate::dir::DatabaseDir;
use crate::error::CoreResult;
use crate::history::{CommitRecord, HistoryLog, Instruction};
use crate::snapshot::Snapshot;
use crate::stats::DatabaseStats;
use crate::transaction::versions::{VersionPin, VersionRegistry};
use crate::transaction::view::{View, ViewMode};
use crate::types::{TransactionId, VersionId};

/// Owns the committed snapshot and serializes writers.
///
/// Readers take the current snapshot under a short read lock and never
/// wait for writers. Writers hold the writer slot from `begin_write`
/// until commit or rollback, so at most one write transaction exists.
pub(crate) struct TransactionManager {
    current: RwLock<Arc<Snapshot>>,
    writer_busy: Mutex<bool>,
    writer_released: Condvar,
    versions: Arc<VersionRegistry>,
    history: Option<HistoryLog>,
    next_txid: AtomicU64,
    limits: Limits,
    stats: Arc<DatabaseStats>,
    // declared after `history` so the lock is released last
    lock: Option<DatabaseDir>,
}

impl TransactionManager {
    pub(crate) fn new(
        snapshot: Snapshot,
        history: Option<HistoryLog>,
        limits: Limits,
        stats: Arc<DatabaseStats>,
    ) -> Self {
        let version = snapshot.version();
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            writer_busy: Mutex::new(false),
            writer_released: Condvar::new(),
            versions: Arc::new(VersionRegistry::new(version, Arc::clone(&stats))),
            history,
            next_txid: AtomicU64::new(1),
            limits,
            stats,
            lock: None,
        }
    }

    /// Holds the directory lock for as long as any transaction or database
    /// handle keeps the engine alive.
    #[must_use]
    pub(crate) fn with_lock(mut self, dir: DatabaseDir) -> Self {
        self.lock = Some(dir);
        self
    }

    pub(crate) fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    pub(crate) fn version(&self) -> VersionId {
        self.current.read().version()
    }

    pub(crate) fn stats(&self) -> &Arc<DatabaseStats> {
        &self.stats
    }

    pub(crate) fn versions(&self) -> &VersionRegistry {
        &self.versions
    }

    pub(crate) fn pin(&self, version: VersionId) -> VersionPin {
        self.versions.pin(version)
    }

    /// Opens a view on the current snapshot and pins its version.
    pub(crate) fn open_view(&self, mode: ViewMode) -> (Arc<View>, VersionPin) {
        let id = TransactionId::new(self.next_txid.fetch_add(1, Ordering::Relaxed));
        // Pin under the read lock so the version cannot be published past
        // and released in between.
        let current = self.current.read();
        let pin = self.versions.pin(current.version());
        let view = View::new(
            id,
            Arc::clone(&current),
            mode,
            self.limits,
            Arc::clone(&self.stats),
        );
        (Arc::new(view), pin)
    }

    /// Moves `pin` to the current version and returns that snapshot, or
    /// `None` if `pin` is already there.
    ///
    /// The pin is taken under the read lock, so the version cannot be
    /// superseded and counted as released before it is pinned.
    pub(crate) fn advance_pin(&self, pin: &mut VersionPin) -> Option<Arc<Snapshot>> {
        let current = self.current.read();
        if current.version() == pin.version() {
            return None;
        }
        pin.repin(current.version());
        Some(Arc::clone(&current))
    }

    /// Waits until no other writer is active.
    pub(crate) fn acquire_writer(self: &Arc<Self>) -> WriterSlot {
        let mut busy = self.writer_busy.lock();
        while *busy {
            self.writer_released.wait(&mut busy);
        }
        *busy = true;
        WriterSlot {
            manager: Arc::clone(self),
        }
    }

    /// Takes the writer slot only if it is free.
    pub(crate) fn try_acquire_writer(self: &Arc<Self>) -> Option<WriterSlot> {
        let mut busy = self.writer_busy.lock();
        if *busy {
            return None;
        }
        *busy = true;
        Some(WriterSlot {
            manager: Arc::clone(self),
        })
    }

    fn release_writer(&self) {
        *self.writer_busy.lock() = false;
        self.writer_released.notify_one();
    }

    /// Makes `working` the next committed version.
    ///
    /// The history record is written before the snapshot is published; if
    /// it cannot be written nothing becomes visible. Must be called with
    /// the writer slot held.
    pub(crate) fn commit(
        &self,
        working: &Snapshot,
        instructions: Vec<Instruction>,
    ) -> CoreResult<Arc<Snapshot>> {
        let version = self.version().next();
        let mut next = working.clone();
        next.set_version(version);

        let count = instructions.len();
        let mut history_bytes = 0;
        if let Some(history) = &self.history {
            let before = history.size()?;
            history.append_commit(&CommitRecord {
                version,
                instructions,
            })?;
            history_bytes = history.size()?.saturating_sub(before);
        }

        let next = Arc::new(next);
        {
            let mut current = self.current.write();
            *current = Arc::clone(&next);
            self.versions.set_current(version);
        }
        self.stats.record_commit(count, history_bytes);
        debug!(%version, instructions = count, "committed");
        Ok(next)
    }
}

/// Exclusive right to write. Released on drop.
pub(crate) struct WriterSlot {
    manager: Arc<TransactionManager>,
}

impl std::fmt::Debug for WriterSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WriterSlot")
    }
}

impl Drop for WriterSlot {
    fn drop(&mut self) {
        self.manager.release_writer();
    }
}
