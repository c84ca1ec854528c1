//! # Columba Core
//!
//! Embedded, versioned object store with typed columnar tables.
//!
//! - Copy-on-write snapshots: readers never wait for the writer
//! - A single writer at a time, with atomic commit and rollback
//! - Non-owning table and object handles that check their own validity
//! - A checksummed history log replayed on open
//!
//! ```rust,ignore
//! use columba_core::{ColumnType, Database};
//!
//! let db = Database::open_in_memory()?;
//! let mut txn = db.begin_write()?;
//! let person = txn.add_table("person")?;
//! let age = person.add_column("age", ColumnType::Int, false)?;
//! let ada = person.create_object()?;
//! ada.set(age, 36)?;
//! txn.commit()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod column;
mod config;
mod database;
mod dir;
mod error;
mod handle;
pub mod history;
pub mod registry;
mod snapshot;
mod stats;
mod table;
mod timestamp;
mod transaction;
mod types;
mod value;

pub use column::{Column, ColumnSpec};
pub use config::{Config, Limits, DEFAULT_MAX_BINARY_SIZE, DEFAULT_MAX_STRING_SIZE};
pub use database::Database;
pub use dir::HISTORY_FILE;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use handle::{Obj, TableRef};
pub use snapshot::Snapshot;
pub use stats::{DatabaseStats, StatsSnapshot};
pub use table::Table;
pub use timestamp::Timestamp;
pub use transaction::{ReadTransaction, Transaction, TransactionState, WriteTransaction};
pub use types::{ColKey, ObjKey, OrNotFound, TableKey, TransactionId, VersionId, NOT_FOUND};
pub use value::{ColumnType, Value};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
