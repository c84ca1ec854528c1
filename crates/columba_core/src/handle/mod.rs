//! Non-owning handles to tables and objects.
//!
//! A handle never keeps a snapshot alive. It remembers the view it came
//! from and the view's generation at that moment, and checks both before
//! every operation. Operations through an invalid handle log at error
//! level and fail with `IllegalState`.

mod obj;
mod table_ref;

pub use obj::Obj;
pub use table_ref::TableRef;

use std::sync::{Arc, Weak};

use crate::error::{CoreError, CoreResult};
use crate::history::Instruction;
use crate::snapshot::Snapshot;
use crate::transaction::view::View;

/// Where a handle is attached.
#[derive(Debug, Clone)]
pub(crate) struct Anchor {
    view: Weak<View>,
    generation: u64,
}

impl Anchor {
    pub(crate) fn new(view: &Arc<View>) -> Self {
        Self {
            view: Arc::downgrade(view),
            generation: view.generation(),
        }
    }

    /// Evaluates `f` if the view is alive and has not moved on. Never logs.
    pub(crate) fn check(&self, f: impl FnOnce(&Snapshot) -> bool) -> bool {
        self.view.upgrade().is_some_and(|v| {
            matches!(v.read(self.generation, |snap| Ok(f(snap))), Some(Ok(true)))
        })
    }

    /// Reads through the view. `stale` builds the error for a detached
    /// handle.
    pub(crate) fn read<R>(
        &self,
        stale: impl Fn() -> CoreError,
        f: impl FnOnce(&Snapshot) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let Some(view) = self.view.upgrade() else {
            return Err(stale());
        };
        match view.read(self.generation, f) {
            Some(result) => result,
            None => {
                view.stats().record_stale_handle();
                Err(stale())
            }
        }
    }

    /// Writes through the view.
    pub(crate) fn write(
        &self,
        stale: impl Fn() -> CoreError,
        build: impl FnOnce(&Snapshot) -> CoreResult<Instruction>,
    ) -> CoreResult<Instruction> {
        let Some(view) = self.view.upgrade() else {
            return Err(stale());
        };
        match view.write(self.generation, build) {
            Some(result) => result,
            None => {
                view.stats().record_stale_handle();
                Err(stale())
            }
        }
    }
}
