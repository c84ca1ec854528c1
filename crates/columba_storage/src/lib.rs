//! # Columba Storage
//!
//! Byte-store backends underneath the Columba history log.
//!
//! Backends are **opaque**: they append, read back, flush and truncate
//! bytes. Record framing, checksums and replay all live in `columba_core`.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral databases and tests; clones of a
//!   [`InMemoryBackend::share`] handle see the same bytes, which lets tests
//!   "reopen" an in-memory database
//! - [`FileBackend`] - a single append-only file
//! - [`FaultyBackend`] - wraps another backend and fails on demand, for
//!   exercising commit rollback and torn-write recovery
//!
//! ## Example
//!
//! ```rust
//! use columba_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"changeset").unwrap();
//! assert_eq!(backend.read_at(offset, 9).unwrap(), b"changeset");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod faulty;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use faulty::{FaultSwitch, FaultyBackend};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
