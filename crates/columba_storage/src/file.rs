//! File-backed storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A byte store kept in one append-only file.
///
/// `flush` hands buffered bytes to the OS; `sync` calls `sync_all` so the
/// bytes and the file length reach the disk.
///
/// ```no_run
/// use columba_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("history.log")).unwrap();
/// backend.append(b"changeset").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    inner: Mutex<FileState>,
}

#[derive(Debug)]
struct FileState {
    file: File,
    size: u64,
}

impl FileBackend {
    /// Opens the file at `path`, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let size = file.metadata()?.len();

        tracing::debug!(path = %path.display(), size, "opened history file");

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(FileState { file, size }),
        })
    }

    /// Like [`FileBackend::open`], creating missing parent directories first.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or the file cannot be created.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut state = self.inner.lock();
        let size = state.size;
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        state.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        state.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let state = self.inner.get_mut();
        let offset = state.size;
        if data.is_empty() {
            return Ok(offset);
        }

        state.file.seek(SeekFrom::End(0))?;
        state.file.write_all(data)?;
        state.size += data.len() as u64;
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.inner.get_mut().file.flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.inner.lock().size)
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.inner.get_mut().file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let state = self.inner.get_mut();
        if new_size > state.size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size: state.size,
            });
        }

        state.file.set_len(new_size)?;
        state.file.sync_all()?;
        state.size = new_size;
        Ok(())
    }
}
