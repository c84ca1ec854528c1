//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// A byte store kept in process memory.
///
/// The buffer is reference counted: [`InMemoryBackend::share`] returns a
/// second handle onto the same bytes. A test can hand one handle to a
/// database, drop the database, and open a new one on the other handle to
/// exercise history replay without touching the file system.
///
/// ```rust
/// use columba_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let shared = backend.share();
/// backend.append(b"abc").unwrap();
/// assert_eq!(shared.size().unwrap(), 3);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend preloaded with `data`.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns another handle onto the same buffer.
    #[must_use]
    pub fn share(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }

    /// Copies the current contents out.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Overwrites the byte at `offset`. Used by tests to simulate bit rot.
    ///
    /// # Errors
    ///
    /// Fails with [`StorageError::ReadPastEnd`] if `offset` is outside the buffer.
    pub fn corrupt_byte(&self, offset: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        let byte = data
            .get_mut(offset as usize)
            .ok_or(StorageError::ReadPastEnd {
                offset,
                len: 1,
                size,
            })?;
        *byte ^= 0xFF;
        Ok(())
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[start..end].to_vec())
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        data.truncate(new_size as usize);
        Ok(())
    }
}
