//! Error types for the Columba engine.
//!
//! Every failure projects onto the closed [`ErrorKind`] taxonomy. Bindings
//! translate that tag one-to-one; they never inspect messages.

use columba_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Closed classification of every engine failure.
///
/// Discriminants are stable and start at 0 so bindings can use them as
/// wire codes directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    /// A required class/table is missing. Indicates misconfiguration.
    ClassNotFound = 0,
    /// A caller-supplied value violates a contract.
    IllegalArgument = 1,
    /// An index is outside a list or table.
    IndexOutOfBounds = 2,
    /// The operation is not supported for this column or object.
    UnsupportedOperation = 3,
    /// An allocation failed.
    OutOfMemory = 4,
    /// Unrecoverable engine failure.
    FatalError = 5,
    /// Anything else.
    RuntimeError = 6,
    /// A handle or version number refers to a snapshot that is gone.
    BadVersion = 7,
    /// The operation is invalid in the current lifecycle state.
    IllegalState = 8,
    /// The history file is corrupt or could not be read or written.
    FileError = 9,
}

impl ErrorKind {
    /// All kinds in discriminant order.
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::ClassNotFound,
        ErrorKind::IllegalArgument,
        ErrorKind::IndexOutOfBounds,
        ErrorKind::UnsupportedOperation,
        ErrorKind::OutOfMemory,
        ErrorKind::FatalError,
        ErrorKind::RuntimeError,
        ErrorKind::BadVersion,
        ErrorKind::IllegalState,
        ErrorKind::FileError,
    ];

    /// Stable name of the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ErrorKind::ClassNotFound => "ClassNotFound",
            ErrorKind::IllegalArgument => "IllegalArgument",
            ErrorKind::IndexOutOfBounds => "IndexOutOfBounds",
            ErrorKind::UnsupportedOperation => "UnsupportedOperation",
            ErrorKind::OutOfMemory => "OutOfMemory",
            ErrorKind::FatalError => "FatalError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::BadVersion => "BadVersion",
            ErrorKind::IllegalState => "IllegalState",
            ErrorKind::FileError => "FileError",
        }
    }

    /// Whether the engine state may be unusable after this error.
    ///
    /// These are never retried internally; the caller decides whether to
    /// retry the whole transaction.
    #[must_use]
    pub const fn is_engine_fault(self) -> bool {
        matches!(
            self,
            ErrorKind::OutOfMemory | ErrorKind::FatalError | ErrorKind::FileError
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised by engine operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A named table required by the caller does not exist.
    #[error("class not found: {name}")]
    ClassNotFound {
        /// Table name that was looked up.
        name: String,
    },

    /// Argument rejected before any mutation was applied.
    #[error("{message}")]
    IllegalArgument {
        /// Human-readable detail, naming the column or table.
        message: String,
    },

    /// Index outside a list or table.
    #[error("index {index} out of bounds for {what} of length {len}")]
    IndexOutOfBounds {
        /// What was indexed, e.g. `list 'tags'`.
        what: String,
        /// Offending index.
        index: usize,
        /// Current length.
        len: usize,
    },

    /// Operation not supported for the target.
    #[error("unsupported operation: {message}")]
    UnsupportedOperation {
        /// Description.
        message: String,
    },

    /// Allocation failure while growing column storage.
    #[error("out of memory: could not reserve {requested} more slots for {what}")]
    OutOfMemory {
        /// What was growing.
        what: String,
        /// Requested additional capacity.
        requested: usize,
    },

    /// Unrecoverable failure.
    #[error("fatal error: {message}")]
    Fatal {
        /// Description.
        message: String,
    },

    /// Catch-all runtime failure.
    #[error("{message}")]
    Runtime {
        /// Description.
        message: String,
    },

    /// Handle or version refers to a snapshot that no longer exists.
    #[error("bad version: {message}")]
    BadVersion {
        /// Description.
        message: String,
    },

    /// Operation invalid in the current lifecycle state.
    #[error("{message}")]
    IllegalState {
        /// Description.
        message: String,
    },

    /// Storage backend failure.
    #[error("history file error: {0}")]
    Storage(#[from] StorageError),

    /// History record failed validation.
    #[error("history corruption at offset {offset}: {message}")]
    HistoryCorruption {
        /// Offset of the bad record.
        offset: u64,
        /// Description.
        message: String,
    },

    /// Another open database holds the directory lock.
    #[error("database at {path} is locked by another open handle")]
    DatabaseLocked {
        /// Database directory.
        path: String,
    },

    /// History record checksum mismatch.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the bad record.
        offset: u64,
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },
}

impl CoreError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ClassNotFound { .. } => ErrorKind::ClassNotFound,
            Self::IllegalArgument { .. } => ErrorKind::IllegalArgument,
            Self::IndexOutOfBounds { .. } => ErrorKind::IndexOutOfBounds,
            Self::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            Self::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Self::Fatal { .. } => ErrorKind::FatalError,
            Self::Runtime { .. } => ErrorKind::RuntimeError,
            Self::BadVersion { .. } => ErrorKind::BadVersion,
            Self::IllegalState { .. } => ErrorKind::IllegalState,
            Self::Storage(_)
            | Self::HistoryCorruption { .. }
            | Self::ChecksumMismatch { .. }
            | Self::DatabaseLocked { .. } => {
                ErrorKind::FileError
            }
        }
    }

    /// Creates an illegal argument error.
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument {
            message: message.into(),
        }
    }

    /// Creates an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Creates an index out of bounds error.
    pub fn index_out_of_bounds(what: impl Into<String>, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            what: what.into(),
            index,
            len,
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            message: message.into(),
        }
    }

    /// Creates a bad version error.
    pub fn bad_version(message: impl Into<String>) -> Self {
        Self::BadVersion {
            message: message.into(),
        }
    }

    /// Creates a fatal error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Creates a runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Creates a history corruption error.
    pub fn history_corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::HistoryCorruption {
            offset,
            message: message.into(),
        }
    }

    /// The message raised when a table handle outlived its version.
    pub fn table_invalid() -> Self {
        Self::illegal_state("Table is no longer valid to operate on.")
    }

    /// The message raised when an object handle outlived its row.
    pub fn object_invalid() -> Self {
        Self::illegal_state(
            "Object is no longer valid to operate on. Was it deleted by another thread?",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_stable_discriminants() {
        for (i, kind) in ErrorKind::ALL.iter().enumerate() {
            assert_eq!(*kind as usize, i);
        }
        assert_eq!(ErrorKind::IllegalState.name(), "IllegalState");
    }

    #[test]
    fn storage_errors_are_file_errors() {
        let err: CoreError = StorageError::Injected("append").into();
        assert_eq!(err.kind(), ErrorKind::FileError);
        assert!(err.kind().is_engine_fault());

        let err = CoreError::ChecksumMismatch {
            offset: 0,
            expected: 1,
            actual: 2,
        };
        assert_eq!(err.kind(), ErrorKind::FileError);
    }

    #[test]
    fn validity_messages() {
        assert_eq!(
            CoreError::table_invalid().to_string(),
            "Table is no longer valid to operate on."
        );
        let err = CoreError::object_invalid();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert!(err.to_string().contains("deleted by another thread"));
    }

    #[test]
    fn argument_errors_are_not_engine_faults() {
        let err = CoreError::illegal_argument("This field(age) is not nullable.");
        assert_eq!(err.kind(), ErrorKind::IllegalArgument);
        assert!(!err.kind().is_engine_fault());
        assert_eq!(err.to_string(), "This field(age) is not nullable.");
    }
}
