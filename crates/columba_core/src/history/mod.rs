//! Durable history of committed change sets.
//!
//! Each commit is written as one checksummed record holding the new
//! version and the instructions that produced it. Opening a database
//! replays the records in order on top of the empty snapshot.

mod instruction;
mod log;
mod record;

pub use instruction::Instruction;
pub use log::{read_records, HistoryLog, ReplaySummary};
pub use record::{CommitRecord, RecordType, HISTORY_FORMAT_VERSION, HISTORY_MAGIC};
