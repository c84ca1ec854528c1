//! Result codes, boundary errors and the per-thread last error.

use std::cell::RefCell;
use std::ffi::{c_char, CString};

use columba_core::{CoreError, ErrorKind};
use thiserror::Error;
use tracing::debug;

/// Result code returned across the boundary.
///
/// Discriminants follow the error taxonomy order, shifted by one so that
/// `Ok` is zero. They are part of the ABI and never change.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// Operation succeeded.
    Ok = 0,
    /// A named table or class does not exist.
    ClassNotFound = 1,
    /// Invalid argument.
    IllegalArgument = 2,
    /// Index out of range.
    IndexOutOfBounds = 3,
    /// Operation not supported on this column or object.
    UnsupportedOperation = 4,
    /// Allocation failed.
    OutOfMemory = 5,
    /// Internal invariant broken.
    FatalError = 6,
    /// Generic runtime failure.
    RuntimeError = 7,
    /// Version mismatch.
    BadVersion = 8,
    /// Invalid handle or transaction state.
    IllegalState = 9,
    /// Storage or history failure.
    FileError = 10,
}

impl ResultCode {
    /// Maps an error kind to its code.
    pub const fn from_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::ClassNotFound => Self::ClassNotFound,
            ErrorKind::IllegalArgument => Self::IllegalArgument,
            ErrorKind::IndexOutOfBounds => Self::IndexOutOfBounds,
            ErrorKind::UnsupportedOperation => Self::UnsupportedOperation,
            ErrorKind::OutOfMemory => Self::OutOfMemory,
            ErrorKind::FatalError => Self::FatalError,
            ErrorKind::RuntimeError => Self::RuntimeError,
            ErrorKind::BadVersion => Self::BadVersion,
            ErrorKind::IllegalState => Self::IllegalState,
            ErrorKind::FileError => Self::FileError,
        }
    }

    /// The error kind behind a failure code; `None` for `Ok`.
    pub const fn kind(self) -> Option<ErrorKind> {
        match self {
            Self::Ok => None,
            Self::ClassNotFound => Some(ErrorKind::ClassNotFound),
            Self::IllegalArgument => Some(ErrorKind::IllegalArgument),
            Self::IndexOutOfBounds => Some(ErrorKind::IndexOutOfBounds),
            Self::UnsupportedOperation => Some(ErrorKind::UnsupportedOperation),
            Self::OutOfMemory => Some(ErrorKind::OutOfMemory),
            Self::FatalError => Some(ErrorKind::FatalError),
            Self::RuntimeError => Some(ErrorKind::RuntimeError),
            Self::BadVersion => Some(ErrorKind::BadVersion),
            Self::IllegalState => Some(ErrorKind::IllegalState),
            Self::FileError => Some(ErrorKind::FileError),
        }
    }

    /// Returns true if the code indicates success.
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Returns true if the code indicates an error.
    pub fn is_err(self) -> bool {
        self != Self::Ok
    }
}

impl From<ResultCode> for i32 {
    fn from(code: ResultCode) -> Self {
        code as i32
    }
}

impl From<i32> for ResultCode {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::ClassNotFound,
            2 => Self::IllegalArgument,
            3 => Self::IndexOutOfBounds,
            4 => Self::UnsupportedOperation,
            5 => Self::OutOfMemory,
            6 => Self::FatalError,
            7 => Self::RuntimeError,
            8 => Self::BadVersion,
            9 => Self::IllegalState,
            10 => Self::FileError,
            _ => Self::RuntimeError,
        }
    }
}

/// Errors raised at the boundary.
#[derive(Debug, Error)]
pub enum FfiError {
    /// Failure inside the engine.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A required pointer argument was null.
    #[error("null pointer passed for '{0}'")]
    NullPointer(&'static str),

    /// A handle was never issued or has been released.
    #[error("{what} handle {handle} is not valid")]
    StaleHandle {
        /// What the handle was supposed to refer to.
        what: &'static str,
        /// The raw handle value.
        handle: i64,
    },

    /// The transaction handle refers to the wrong kind of transaction.
    #[error("transaction {handle} is not a {expected} transaction")]
    WrongTransaction {
        /// The raw handle value.
        handle: i64,
        /// The kind the operation needs.
        expected: &'static str,
    },

    /// Bytes passed as a string were not UTF-8.
    #[error("string is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A numeric code outside the known set.
    #[error("unknown {what} code {code}")]
    UnknownCode {
        /// What was being decoded.
        what: &'static str,
        /// The code received.
        code: i32,
    },
}

impl FfiError {
    /// Projects onto the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(err) => err.kind(),
            Self::NullPointer(_) | Self::InvalidUtf8(_) | Self::UnknownCode { .. } => {
                ErrorKind::IllegalArgument
            }
            Self::StaleHandle { .. } | Self::WrongTransaction { .. } => ErrorKind::IllegalState,
        }
    }

    /// The boundary code for this error.
    pub fn code(&self) -> ResultCode {
        translate(self.kind())
    }
}

/// Result type for boundary operations.
pub type FfiResult<T> = Result<T, FfiError>;

/// Maps an error kind to a result code.
pub const fn translate(kind: ErrorKind) -> ResultCode {
    ResultCode::from_kind(kind)
}

struct LastError {
    code: ResultCode,
    category: CString,
    detail: CString,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<LastError>> = const { RefCell::new(None) };
}

/// Stores `err` as this thread's last error and returns its code.
pub fn report(err: &FfiError) -> ResultCode {
    let code = err.code();
    let kind = err.kind();
    debug!(kind = kind.name(), error = %err, "boundary call failed");
    // interior NULs cannot cross a C string; keep the text up to the first one
    let detail = err.to_string();
    let detail = detail.split('\0').next().unwrap_or_default();
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = Some(LastError {
            code,
            category: CString::new(kind.name()).unwrap_or_default(),
            detail: CString::new(detail).unwrap_or_default(),
        });
    });
    code
}

/// Runs `f`, reporting its failure into the last-error slot.
pub fn guard<T>(f: impl FnOnce() -> FfiResult<T>) -> Result<T, ResultCode> {
    clear_last_error();
    f().map_err(|err| report(&err))
}

/// Code of this thread's last error, or `Ok`.
pub fn last_error_code() -> ResultCode {
    LAST_ERROR.with(|slot| slot.borrow().as_ref().map_or(ResultCode::Ok, |e| e.code))
}

/// Detail text of this thread's last error.
pub fn last_error_message() -> Option<String> {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|e| e.detail.to_string_lossy().into_owned())
    })
}

/// Clears this thread's last error.
pub fn clear_last_error() {
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = None;
    });
}

/// Detail message of the last error on this thread, or null.
///
/// The pointer stays valid until the next boundary call on this thread.
#[no_mangle]
pub extern "C" fn columba_last_error_message() -> *const c_char {
    LAST_ERROR.with(|slot| match slot.borrow().as_ref() {
        Some(e) => e.detail.as_ptr(),
        None => std::ptr::null(),
    })
}

/// Category (error kind name) of the last error on this thread, or null.
#[no_mangle]
pub extern "C" fn columba_last_error_category() -> *const c_char {
    LAST_ERROR.with(|slot| match slot.borrow().as_ref() {
        Some(e) => e.category.as_ptr(),
        None => std::ptr::null(),
    })
}

/// Code of the last error on this thread.
#[no_mangle]
pub extern "C" fn columba_last_error_code() -> ResultCode {
    last_error_code()
}

/// Clears the last error on this thread.
#[no_mangle]
pub extern "C" fn columba_clear_error() {
    clear_last_error();
}
