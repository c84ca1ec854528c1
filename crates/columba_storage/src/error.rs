//! Storage error types.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read extended past the end of the store.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: usize,
        /// Size of the store.
        size: u64,
    },

    /// A truncate asked for a size larger than the store.
    #[error("cannot truncate to {requested} bytes, store holds {size}")]
    TruncateBeyondEnd {
        /// Requested size.
        requested: u64,
        /// Size of the store.
        size: u64,
    },

    /// A fault injected by [`crate::FaultyBackend`].
    #[error("injected fault: {0}")]
    Injected(&'static str),
}
