//! Database directory layout and locking.
//!
//! ```text
//! <db_path>/
//! ├─ LOCK          # advisory lock, one open database per directory
//! └─ history.log   # committed change sets
//! ```

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use columba_storage::StorageError;
use fs2::FileExt;
use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// File name of the history log inside a database directory.
pub const HISTORY_FILE: &str = "history.log";
const LOCK_FILE: &str = "LOCK";

/// An open database directory.
///
/// Holds an exclusive advisory lock on `LOCK` for as long as it lives, so
/// a second open of the same directory fails until every clone of the
/// first database is dropped.
#[derive(Debug)]
pub(crate) struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens, or creates, the directory at `path` and takes its lock.
    pub(crate) fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if !create_if_missing {
                return Err(file_error(
                    io::ErrorKind::NotFound,
                    format!("no database at {} and create_if_missing is false", path.display()),
                ));
            }
            fs::create_dir_all(path).map_err(StorageError::Io)?;
        }
        if !path.is_dir() {
            return Err(file_error(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", path.display()),
            ));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))
            .map_err(StorageError::Io)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked {
                path: path.display().to_string(),
            });
        }
        debug!(path = %path.display(), "database directory locked");

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    pub(crate) fn history_path(&self) -> PathBuf {
        self.path.join(HISTORY_FILE)
    }
}

impl Drop for DatabaseDir {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "database directory unlocked");
    }
}

pub(crate) fn file_error(kind: io::ErrorKind, message: String) -> CoreError {
    CoreError::Storage(StorageError::Io(io::Error::new(kind, message)))
}
