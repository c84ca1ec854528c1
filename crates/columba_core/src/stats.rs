//! Engine counters.
//!
//! All counters are atomic and can be read while transactions are in
//! flight. They only ever grow.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live engine counters.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    read_transactions: AtomicU64,
    write_transactions: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    advances: AtomicU64,
    instructions: AtomicU64,
    history_bytes: AtomicU64,
    stale_handle_uses: AtomicU64,
    versions_reclaimed: AtomicU64,
}

impl DatabaseStats {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_read_begin(&self) {
        self.read_transactions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_begin(&self) {
        self.write_transactions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self, instructions: usize, history_bytes: u64) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        self.instructions
            .fetch_add(instructions as u64, Ordering::Relaxed);
        self.history_bytes.fetch_add(history_bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_advance(&self) {
        self.advances.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_handle(&self) {
        self.stale_handle_uses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reclaim(&self, versions: u64) {
        self.versions_reclaimed.fetch_add(versions, Ordering::Relaxed);
    }

    /// Read transactions begun.
    pub fn read_transactions(&self) -> u64 {
        self.read_transactions.load(Ordering::Relaxed)
    }

    /// Write transactions begun.
    pub fn write_transactions(&self) -> u64 {
        self.write_transactions.load(Ordering::Relaxed)
    }

    /// Successful commits.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Write transactions rolled back, explicitly or by a failed commit.
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    /// Read transactions advanced to a newer version.
    pub fn advances(&self) -> u64 {
        self.advances.load(Ordering::Relaxed)
    }

    /// Instructions committed.
    pub fn instructions(&self) -> u64 {
        self.instructions.load(Ordering::Relaxed)
    }

    /// Bytes appended to the history log.
    pub fn history_bytes(&self) -> u64 {
        self.history_bytes.load(Ordering::Relaxed)
    }

    /// Operations rejected because a handle was no longer valid.
    pub fn stale_handle_uses(&self) -> u64 {
        self.stale_handle_uses.load(Ordering::Relaxed)
    }

    /// Snapshots released after their last pin went away.
    pub fn versions_reclaimed(&self) -> u64 {
        self.versions_reclaimed.load(Ordering::Relaxed)
    }

    /// Copies every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            read_transactions: self.read_transactions(),
            write_transactions: self.write_transactions(),
            commits: self.commits(),
            rollbacks: self.rollbacks(),
            advances: self.advances(),
            instructions: self.instructions(),
            history_bytes: self.history_bytes(),
            stale_handle_uses: self.stale_handle_uses(),
            versions_reclaimed: self.versions_reclaimed(),
        }
    }
}

/// Plain copy of [`DatabaseStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Read transactions begun.
    pub read_transactions: u64,
    /// Write transactions begun.
    pub write_transactions: u64,
    /// Successful commits.
    pub commits: u64,
    /// Rolled back write transactions.
    pub rollbacks: u64,
    /// Read transaction advances.
    pub advances: u64,
    /// Instructions committed.
    pub instructions: u64,
    /// Bytes appended to the history log.
    pub history_bytes: u64,
    /// Rejected stale handle uses.
    pub stale_handle_uses: u64,
    /// Reclaimed snapshots.
    pub versions_reclaimed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = DatabaseStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn commit_accumulates() {
        let stats = DatabaseStats::new();
        stats.record_commit(3, 100);
        stats.record_commit(2, 50);
        stats.record_rollback();

        let snap = stats.snapshot();
        assert_eq!(snap.commits, 2);
        assert_eq!(snap.instructions, 5);
        assert_eq!(snap.history_bytes, 150);
        assert_eq!(snap.rollbacks, 1);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(DatabaseStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.record_read_begin();
                        s.record_stale_handle();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.read_transactions(), 800);
        assert_eq!(stats.stale_handle_uses(), 800);
    }
}
