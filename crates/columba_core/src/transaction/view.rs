//! Per-transaction attachment point for handles.
//!
//! Handles hold a `Weak<View>` plus the generation they were created
//! under. A handle is usable only while the view is alive and its
//! generation is unchanged. Advancing or closing the view bumps the
//! generation while the snapshot lock is held, so a handle check that
//! succeeds under the read lock can never observe a newer snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::Limits;
use crate::error::{CoreError, CoreResult};
use crate::history::Instruction;
use crate::snapshot::Snapshot;
use crate::stats::DatabaseStats;
use crate::types::TransactionId;

/// What a view currently permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ViewMode {
    Read,
    Write,
    Closed,
}

struct ViewState {
    snapshot: Arc<Snapshot>,
    mode: ViewMode,
}

pub(crate) struct View {
    id: TransactionId,
    generation: AtomicU64,
    state: RwLock<ViewState>,
    changes: Mutex<Vec<Instruction>>,
    limits: Limits,
    stats: Arc<DatabaseStats>,
}

impl View {
    pub(crate) fn new(
        id: TransactionId,
        snapshot: Arc<Snapshot>,
        mode: ViewMode,
        limits: Limits,
        stats: Arc<DatabaseStats>,
    ) -> Self {
        Self {
            id,
            generation: AtomicU64::new(0),
            state: RwLock::new(ViewState { snapshot, mode }),
            changes: Mutex::new(Vec::new()),
            limits,
            stats,
        }
    }

    pub(crate) const fn id(&self) -> TransactionId {
        self.id
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub(crate) fn stats(&self) -> &DatabaseStats {
        &self.stats
    }

    /// Current snapshot, for transaction-level reads.
    pub(crate) fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.state.read().snapshot)
    }

    /// Runs `f` against the snapshot if `generation` is still current.
    pub(crate) fn read<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&Snapshot) -> CoreResult<R>,
    ) -> Option<CoreResult<R>> {
        let state = self.state.read();
        if state.mode == ViewMode::Closed || self.generation() != generation {
            return None;
        }
        Some(f(&state.snapshot))
    }

    /// Builds an instruction against the current snapshot, applies it and
    /// records it. Returns `None` if `generation` is stale.
    pub(crate) fn write(
        &self,
        generation: u64,
        build: impl FnOnce(&Snapshot) -> CoreResult<Instruction>,
    ) -> Option<CoreResult<Instruction>> {
        let mut changes = self.changes.lock();
        let mut state = self.state.write();
        if state.mode == ViewMode::Closed || self.generation() != generation {
            return None;
        }
        if state.mode != ViewMode::Write {
            return Some(Err(CoreError::illegal_state(
                "Cannot modify managed objects outside of a write transaction.",
            )));
        }
        let result = build(&state.snapshot).and_then(|instruction| {
            Arc::make_mut(&mut state.snapshot).apply(&instruction, &self.limits)?;
            changes.push(instruction.clone());
            Ok(instruction)
        });
        Some(result)
    }

    pub(crate) fn change_count(&self) -> usize {
        self.changes.lock().len()
    }

    /// Removes and returns the recorded instructions.
    pub(crate) fn take_changes(&self) -> Vec<Instruction> {
        std::mem::take(&mut *self.changes.lock())
    }

    /// Swaps in another snapshot. With `invalidate`, every handle created
    /// so far stops working.
    pub(crate) fn replace(&self, snapshot: Arc<Snapshot>, mode: ViewMode, invalidate: bool) {
        let mut state = self.state.write();
        state.snapshot = snapshot;
        state.mode = mode;
        if invalidate {
            self.generation.fetch_add(1, Ordering::Release);
        }
    }

    /// Ends the view; all handles become invalid.
    pub(crate) fn close(&self) {
        let mut changes = self.changes.lock();
        let mut state = self.state.write();
        if state.mode != ViewMode::Closed {
            state.mode = ViewMode::Closed;
            self.generation.fetch_add(1, Ordering::Release);
        }
        changes.clear();
    }
}
