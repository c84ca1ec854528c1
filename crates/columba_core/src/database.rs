//! Database facade and history replay.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use columba_storage::{FileBackend, StorageBackend};
use tracing::info;

use crate::config::{Config, Limits};
use crate::dir::{file_error, DatabaseDir};
use crate::error::{CoreError, CoreResult};
use crate::history::HistoryLog;
use crate::snapshot::Snapshot;
use crate::stats::{DatabaseStats, StatsSnapshot};
use crate::transaction::{ReadTransaction, TransactionManager, TransactionState, WriteTransaction};
use crate::types::VersionId;

/// The main database handle.
///
/// Cloning is cheap; all clones share one engine. The handle is `Send`
/// and `Sync`, so one database can serve any number of threads.
///
/// ```rust,ignore
/// use columba_core::{ColumnType, Database};
///
/// let db = Database::open_in_memory()?;
/// db.write(|txn| {
///     let person = txn.add_table("person")?;
///     let age = person.add_column("age", ColumnType::Int, false)?;
///     person.create_object()?.set(age, 42)?;
///     Ok(())
/// })?;
/// ```
#[derive(Clone)]
pub struct Database {
    config: Config,
    path: Option<PathBuf>,
    engine: Arc<TransactionManager>,
}

impl Database {
    /// Opens a database stored in directory `path`.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a database stored in directory `path`.
    ///
    /// # Errors
    ///
    /// `FileError` if the directory is missing and `create_if_missing` is
    /// off, if it already holds history and `error_if_exists` is on, or if
    /// the history cannot be read or replayed.
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = DatabaseDir::open(path, config.create_if_missing)?;
        let history_path = dir.history_path();
        let size = std::fs::metadata(&history_path).map(|m| m.len()).ok();

        if size.is_none() && !config.create_if_missing {
            return Err(file_error(
                io::ErrorKind::NotFound,
                format!("no history in {} and create_if_missing is false", path.display()),
            ));
        }
        if size.is_some_and(|len| len > 0) && config.error_if_exists {
            return Err(file_error(
                io::ErrorKind::AlreadyExists,
                format!("database at {} exists and error_if_exists is true", path.display()),
            ));
        }

        let backend = FileBackend::open_with_create_dirs(&history_path)?;
        let mut db = Self::open_history(Box::new(backend), config, Some(dir))?;
        db.path = Some(path.to_path_buf());
        Ok(db)
    }

    /// Opens a database over an arbitrary history backend, replaying
    /// whatever it already holds.
    pub fn open_with_backend(backend: Box<dyn StorageBackend>, config: Config) -> CoreResult<Self> {
        Self::open_history(backend, config, None)
    }

    fn open_history(
        backend: Box<dyn StorageBackend>,
        config: Config,
        dir: Option<DatabaseDir>,
    ) -> CoreResult<Self> {
        let history = HistoryLog::new(backend, config.sync_on_commit, config.format_version);
        let snapshot = recover(&history)?;
        info!(version = %snapshot.version(), tables = snapshot.table_count(), "database opened");
        Ok(Self::assemble(config, snapshot, Some(history), dir))
    }

    /// Opens a fresh database that lives only in memory.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::in_memory_with_config(Config::default())
    }

    /// Opens a fresh in-memory database with custom limits.
    pub fn in_memory_with_config(config: Config) -> CoreResult<Self> {
        Ok(Self::assemble(config, Snapshot::empty(), None, None))
    }

    fn assemble(
        config: Config,
        snapshot: Snapshot,
        history: Option<HistoryLog>,
        dir: Option<DatabaseDir>,
    ) -> Self {
        let stats = Arc::new(DatabaseStats::new());
        let mut engine = TransactionManager::new(snapshot, history, config.limits(), stats);
        if let Some(dir) = dir {
            engine = engine.with_lock(dir);
        }
        Self {
            config,
            path: None,
            engine: Arc::new(engine),
        }
    }

    /// Starts a read transaction at the current version.
    #[must_use]
    pub fn begin_read(&self) -> ReadTransaction {
        ReadTransaction::begin(&self.engine)
    }

    /// Starts the write transaction, waiting for any other writer to
    /// finish first.
    pub fn begin_write(&self) -> CoreResult<WriteTransaction> {
        let slot = self.engine.acquire_writer();
        Ok(WriteTransaction::begin(&self.engine, slot))
    }

    /// Starts the write transaction only if no other writer is active.
    #[must_use]
    pub fn try_begin_write(&self) -> Option<WriteTransaction> {
        let slot = self.engine.try_acquire_writer()?;
        Some(WriteTransaction::begin(&self.engine, slot))
    }

    /// Runs `f` in a write transaction.
    ///
    /// Commits if `f` returns `Ok` and the transaction is still active,
    /// rolls back if it returns `Err`.
    pub fn write<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut WriteTransaction) -> CoreResult<T>,
    {
        let mut txn = self.begin_write()?;
        match f(&mut txn) {
            Ok(value) => {
                if txn.state() == TransactionState::Active {
                    txn.commit()?;
                }
                Ok(value)
            }
            Err(err) => {
                if txn.state() == TransactionState::Active {
                    txn.rollback()?;
                }
                Err(err)
            }
        }
    }

    /// Runs `f` in a read transaction.
    pub fn read<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&ReadTransaction) -> CoreResult<T>,
    {
        let txn = self.begin_read();
        f(&txn)
    }

    /// Latest committed version.
    #[must_use]
    pub fn version(&self) -> VersionId {
        self.engine.version()
    }

    /// Versions that are current or pinned by a transaction.
    #[must_use]
    pub fn live_versions(&self) -> Vec<VersionId> {
        self.engine.versions().live_versions()
    }

    /// Oldest version a transaction is still pinned to.
    #[must_use]
    pub fn oldest_pinned(&self) -> Option<VersionId> {
        self.engine.versions().oldest_pinned()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.engine.stats().snapshot()
    }

    /// Configuration the database was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory of an on-disk database.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path())
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

/// Rebuilds the latest snapshot from the history log.
///
/// Committed values were checked against the limits in force when they
/// were written, so replay does not re-check sizes.
fn recover(history: &HistoryLog) -> CoreResult<Snapshot> {
    let limits = Limits {
        max_string_size: usize::MAX,
        max_binary_size: usize::MAX,
    };
    let mut snapshot = Snapshot::empty();
    history.replay(|offset, record| {
        let expected = snapshot.version().next();
        if record.version != expected {
            return Err(CoreError::history_corruption(
                offset,
                format!("expected version {expected}, found {}", record.version),
            ));
        }
        for instruction in &record.instructions {
            snapshot.apply(instruction, &limits).map_err(|err| {
                CoreError::history_corruption(
                    offset,
                    format!("{} cannot be replayed: {err}", instruction.op_name()),
                )
            })?;
        }
        snapshot.set_version(record.version);
        Ok(())
    })?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::value::{ColumnType, Value};
    use columba_storage::InMemoryBackend;
    use tempfile::tempdir;

    #[test]
    fn open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.version(), VersionId::INITIAL);
        assert!(db.path().is_none());
    }

    #[test]
    fn every_commit_bumps_version() {
        let db = Database::open_in_memory().unwrap();
        db.write(|_| Ok(())).unwrap();
        db.write(|txn| txn.add_table("t").map(drop)).unwrap();
        assert_eq!(db.version(), VersionId::new(2));
    }

    #[test]
    fn failed_closure_rolls_back() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .write(|txn| {
                txn.add_table("t")?;
                Err::<(), _>(CoreError::runtime("boom"))
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuntimeError);
        assert_eq!(db.version(), VersionId::INITIAL);
        assert!(db.read(|txn| Ok(txn.table("t").is_none())).unwrap());
        assert_eq!(db.stats().rollbacks, 1);
    }

    #[test]
    fn replay_from_backend() {
        let mem = InMemoryBackend::new();
        {
            let db = Database::open_with_backend(Box::new(mem.share()), Config::default()).unwrap();
            db.write(|txn| {
                let t = txn.add_table("person")?;
                let name = t.add_column("name", ColumnType::String, true)?;
                t.create_object()?.set(name, "ada")?;
                let gone = t.create_object()?;
                gone.remove()?;
                t.create_object()?;
                Ok(())
            })
            .unwrap();
        }

        let db = Database::open_with_backend(Box::new(mem.share()), Config::default()).unwrap();
        assert_eq!(db.version(), VersionId::new(1));
        db.read(|txn| {
            let t = txn.require_table("person")?;
            let name = t.column_key("name")?.unwrap();
            let keys = t.keys()?;
            assert_eq!(keys.len(), 2);
            assert_eq!(t.object(keys[0])?.get(name)?, Value::from("ada"));
            // key 1 was deleted and must not come back
            assert_eq!(keys[1].value(), 2);
            Ok(())
        })
        .unwrap();

        // keys keep counting from where the history left off
        db.write(|txn| {
            let obj = txn.require_table("person")?.create_object()?;
            assert_eq!(obj.key().value(), 3);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn corrupt_history_fails_open() {
        let mem = InMemoryBackend::new();
        {
            let db = Database::open_with_backend(Box::new(mem.share()), Config::default()).unwrap();
            db.write(|txn| txn.add_table("t").map(drop)).unwrap();
        }
        mem.corrupt_byte(14).unwrap();
        let err =
            Database::open_with_backend(Box::new(mem.share()), Config::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileError);
    }

    #[test]
    fn on_disk_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let db = Database::open(&path).unwrap();
            db.write(|txn| txn.add_table("t").map(drop)).unwrap();
            assert_eq!(db.path(), Some(path.as_path()));
        }
        let db = Database::open(&path).unwrap();
        assert!(db.read(|txn| Ok(txn.has_table("t"))).unwrap());
    }

    #[test]
    fn open_flags() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let missing = Database::open_with_config(&path, Config::default().create_if_missing(false));
        assert_eq!(missing.unwrap_err().kind(), ErrorKind::FileError);

        {
            let db = Database::open(&path).unwrap();
            db.write(|txn| txn.add_table("t").map(drop)).unwrap();
        }
        let exists = Database::open_with_config(&path, Config::default().error_if_exists(true));
        assert_eq!(exists.unwrap_err().kind(), ErrorKind::FileError);
    }

    #[test]
    fn directory_lock_outlives_clones() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let db = Database::open(&path).unwrap();
        let clone = db.clone();
        drop(db);
        let err = Database::open(&path).unwrap_err();
        assert!(matches!(err, CoreError::DatabaseLocked { .. }));
        drop(clone);
        assert!(Database::open(&path).is_ok());
    }

    #[test]
    fn open_transaction_keeps_directory_locked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let db = Database::open(&path).unwrap();
        let read = db.begin_read();
        drop(db);
        let err = Database::open(&path).unwrap_err();
        assert!(matches!(err, CoreError::DatabaseLocked { .. }));
        drop(read);
        assert!(Database::open(&path).is_ok());
    }
}
