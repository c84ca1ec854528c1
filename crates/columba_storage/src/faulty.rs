//! Fault injection wrapper.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct FaultState {
    /// Appends fail once this many bytes have been written; a crossing
    /// append writes the bytes below the limit first.
    append_limit: AtomicUsize,
    written: AtomicUsize,
    fail_flush: AtomicBool,
    tripped: AtomicBool,
}

/// Remote control for a [`FaultyBackend`].
///
/// The backend is usually boxed into a database, so the switch is the only
/// way for a test to arm it afterwards.
#[derive(Debug, Clone)]
pub struct FaultSwitch {
    state: Arc<FaultState>,
}

impl FaultSwitch {
    /// Fails every append from now on, after letting `bytes` more through.
    pub fn fail_appends_after(&self, bytes: usize) {
        let written = self.state.written.load(Ordering::SeqCst);
        self.state
            .append_limit
            .store(written.saturating_add(bytes), Ordering::SeqCst);
    }

    /// Makes `flush` and `sync` fail.
    pub fn fail_flushes(&self, fail: bool) {
        self.state.fail_flush.store(fail, Ordering::SeqCst);
    }

    /// Disarms all faults.
    pub fn heal(&self) {
        self.state.append_limit.store(usize::MAX, Ordering::SeqCst);
        self.state.fail_flush.store(false, Ordering::SeqCst);
    }

    /// Whether any fault has fired.
    #[must_use]
    pub fn tripped(&self) -> bool {
        self.state.tripped.load(Ordering::SeqCst)
    }
}

/// Wraps a backend and fails appends or flushes when armed.
pub struct FaultyBackend {
    inner: Box<dyn StorageBackend>,
    state: Arc<FaultState>,
}

impl FaultyBackend {
    /// Wraps `inner`, returning the backend and its switch.
    pub fn new(inner: Box<dyn StorageBackend>) -> (Self, FaultSwitch) {
        let state = Arc::new(FaultState {
            append_limit: AtomicUsize::new(usize::MAX),
            written: AtomicUsize::new(0),
            fail_flush: AtomicBool::new(false),
            tripped: AtomicBool::new(false),
        });
        let switch = FaultSwitch {
            state: Arc::clone(&state),
        };
        (Self { inner, state }, switch)
    }

    fn trip(&self, what: &'static str) -> StorageError {
        self.state.tripped.store(true, Ordering::SeqCst);
        tracing::debug!(fault = what, "storage fault injected");
        StorageError::Injected(what)
    }
}

impl StorageBackend for FaultyBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let limit = self.state.append_limit.load(Ordering::SeqCst);
        let written = self.state.written.load(Ordering::SeqCst);

        if written.saturating_add(data.len()) > limit {
            let room = limit.saturating_sub(written);
            if room > 0 {
                self.inner.append(&data[..room])?;
                self.state.written.fetch_add(room, Ordering::SeqCst);
            }
            return Err(self.trip("append"));
        }

        let offset = self.inner.append(data)?;
        self.state.written.fetch_add(data.len(), Ordering::SeqCst);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.state.fail_flush.load(Ordering::SeqCst) {
            return Err(self.trip("flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.state.fail_flush.load(Ordering::SeqCst) {
            return Err(self.trip("sync"));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}
