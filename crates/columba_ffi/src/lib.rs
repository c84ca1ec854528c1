//! # Columba FFI
//!
//! Boundary layer a managed runtime binds against.
//!
//! This crate provides:
//! - Generation-checked integer handles for transactions, tables and objects
//! - Result codes mapped one to one from the engine's error kinds
//! - A per-thread last-error slot
//! - String and timestamp marshaling
//! - A C ABI over [`Session`]

#![warn(missing_docs)]

pub mod checks;
mod error;
pub mod exports;
mod handles;
pub mod marshal;
mod session;

pub use error::{
    clear_last_error, columba_clear_error, columba_last_error_category, columba_last_error_code,
    columba_last_error_message, guard, last_error_code, last_error_message, report, translate,
    FfiError, FfiResult, ResultCode,
};
pub use handles::{Handle, HandleArena};
pub use marshal::{StringAccessor, TABLE_PREFIX};
pub use session::Session;
