//! Crash recovery helpers.
//!
//! A crash is modelled as the history log losing every byte after some
//! offset. Reopening must yield exactly the commits that were complete
//! before the cut.

use columba_core::{Config, CoreResult, Database, VersionId};
use columba_storage::{FaultSwitch, FaultyBackend, InMemoryBackend};

/// Reopens a database from the first `cut` bytes of `history`.
pub fn reopen_truncated(history: &[u8], cut: usize) -> CoreResult<Database> {
    let cut = cut.min(history.len());
    let backend = InMemoryBackend::with_data(history[..cut].to_vec());
    Database::open_with_backend(Box::new(backend), Config::default())
}

/// Byte offsets at which each commit in `history` ends.
pub fn commit_boundaries(history: &[u8]) -> CoreResult<Vec<u64>> {
    let backend = InMemoryBackend::with_data(history.to_vec());
    let mut starts = Vec::new();
    let summary = columba_core::history::read_records(&backend, |offset, _| {
        starts.push(offset);
        Ok(())
    })?;
    let mut ends: Vec<u64> = starts.into_iter().skip(1).collect();
    if summary.records > 0 {
        ends.push(summary.valid_len);
    }
    Ok(ends)
}

/// Version the history replays to when cut at `cut` bytes, given the
/// commit end offsets from [`commit_boundaries`].
pub fn expected_version(boundaries: &[u64], cut: u64) -> VersionId {
    VersionId::new(boundaries.iter().filter(|&&end| end <= cut).count() as u64)
}

/// An in-memory database whose history can be made to fail on demand.
pub struct FaultyDatabase {
    /// The database.
    pub db: Database,
    /// Arms and disarms faults.
    pub switch: FaultSwitch,
    /// The bytes that reached storage.
    pub storage: InMemoryBackend,
}

impl FaultyDatabase {
    /// Opens an empty database over a faulty in-memory backend.
    pub fn new() -> CoreResult<Self> {
        let storage = InMemoryBackend::new();
        let (backend, switch) = FaultyBackend::new(Box::new(storage.share()));
        let db = Database::open_with_backend(Box::new(backend), Config::default())?;
        Ok(Self { db, switch, storage })
    }

    /// Reopens a fresh database from whatever reached storage.
    pub fn recover(&self) -> CoreResult<Database> {
        let copy = InMemoryBackend::with_data(self.storage.data());
        Database::open_with_backend(Box::new(copy), Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_and_expected_versions() {
        let fdb = FaultyDatabase::new().unwrap();
        fdb.db.write(|txn| txn.add_table("a").map(drop)).unwrap();
        fdb.db.write(|txn| txn.add_table("b").map(drop)).unwrap();
        let history = fdb.storage.data();

        let ends = commit_boundaries(&history).unwrap();
        assert_eq!(ends.len(), 2);
        assert_eq!(*ends.last().unwrap(), history.len() as u64);
        assert_eq!(expected_version(&ends, 0), VersionId::INITIAL);
        assert_eq!(expected_version(&ends, ends[0]), VersionId::new(1));
        assert_eq!(expected_version(&ends, ends[0] - 1), VersionId::INITIAL);
    }
}
