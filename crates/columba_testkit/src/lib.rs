//! # Columba Testkit
//!
//! Test utilities for Columba.
//!
//! This crate provides:
//! - Test fixtures and database helpers
//! - Property-based test generators using proptest
//! - A reference model to check engine state against
//! - Crash and torn-write helpers over the history log
//! - Multi-threaded stress drivers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use columba_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_database() {
//!     with_temp_db(|db| {
//!         let people = PersonSchema::create(db).unwrap();
//!         // ... test operations
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod model;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use model::*;
