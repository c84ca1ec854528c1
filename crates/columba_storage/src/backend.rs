//! Storage backend trait.

use crate::error::StorageResult;

/// An append-only byte store.
///
/// The history log is the only writer. It appends whole framed records,
/// reads them back sequentially on open, and truncates a torn tail left by
/// an interrupted append.
///
/// # Invariants
///
/// - `append` returns the offset the bytes were written at
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - after `flush` returns, appended bytes survive the process
/// - implementations are `Send + Sync` so a database can move across threads
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::ReadPastEnd`] if the range is not
    /// fully inside the store, or with an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it starts at.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. A failed append may leave a
    /// partial record behind; readers must tolerate a torn tail.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Current size in bytes, which is also the next append offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Flushes data and metadata to durable media.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Cuts the store back to `new_size` bytes.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::TruncateBeyondEnd`] if `new_size` is
    /// larger than the current size.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
