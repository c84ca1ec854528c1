//! Append-only history log.

use columba_storage::StorageBackend;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::history::record::{verify_frame, CommitRecord, Header, HEADER_SIZE};

/// Outcome of reading a log from start to end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Complete, checksummed records read.
    pub records: usize,
    /// Length of the valid prefix in bytes.
    pub valid_len: u64,
    /// Bytes after the valid prefix that did not form a complete record.
    pub torn_tail: u64,
    /// Highest record format version seen.
    pub max_format_version: u16,
}

/// Reads every complete record of `backend` in order.
///
/// A record cut short at the end of the log marks the end of the log and
/// is reported as `torn_tail`. Any other malformation, including a
/// checksum mismatch, is an error.
///
/// # Errors
///
/// `FileError` kinds for I/O failures and corrupt records, or whatever
/// `on_record` returns.
pub fn read_records<F>(backend: &dyn StorageBackend, mut on_record: F) -> CoreResult<ReplaySummary>
where
    F: FnMut(u64, CommitRecord) -> CoreResult<()>,
{
    let size = backend.size()?;
    let mut summary = ReplaySummary::default();
    let mut offset = 0u64;

    while offset < size {
        let remaining = size - offset;
        if remaining < HEADER_SIZE as u64 {
            break;
        }
        let header_bytes = backend.read_at(offset, HEADER_SIZE)?;
        let header = Header::parse(&header_bytes, offset)?;
        let frame_len = header.frame_len();
        if remaining < frame_len as u64 {
            break;
        }
        let frame = backend.read_at(offset, frame_len)?;
        let payload = verify_frame(&frame, offset)?;
        let record = CommitRecord::decode_payload(payload, offset)?;
        on_record(offset, record)?;

        summary.records += 1;
        summary.max_format_version = summary.max_format_version.max(header.format_version);
        offset += frame_len as u64;
    }

    summary.valid_len = offset;
    summary.torn_tail = size - offset;
    Ok(summary)
}

/// Durable sequence of committed change sets.
pub struct HistoryLog {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_commit: bool,
    format_version: u16,
}

impl HistoryLog {
    /// Wraps a storage backend.
    pub fn new(
        backend: Box<dyn StorageBackend>,
        sync_on_commit: bool,
        format_version: u16,
    ) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
            format_version,
        }
    }

    /// Replays every record through `apply`, then drops a torn tail.
    ///
    /// # Errors
    ///
    /// Fails on corruption, on I/O errors, or when `apply` fails.
    pub fn replay<F>(&self, apply: F) -> CoreResult<ReplaySummary>
    where
        F: FnMut(u64, CommitRecord) -> CoreResult<()>,
    {
        let mut backend = self.backend.lock();
        let summary = read_records(backend.as_ref(), apply)?;
        if summary.torn_tail > 0 {
            warn!(
                valid_len = summary.valid_len,
                torn = summary.torn_tail,
                "dropping incomplete record at end of history"
            );
            backend.truncate(summary.valid_len)?;
        }
        info!(records = summary.records, bytes = summary.valid_len, "history replayed");
        Ok(summary)
    }

    /// Appends one commit and makes it durable per configuration.
    ///
    /// On failure the log is cut back to its previous length so that a
    /// failed commit leaves no trace.
    ///
    /// # Errors
    ///
    /// The append error, or `FatalError` if the log could not be restored.
    pub fn append_commit(&self, record: &CommitRecord) -> CoreResult<u64> {
        let data = record.encode(self.format_version)?;
        let mut backend = self.backend.lock();
        let start = backend.size()?;

        let result = backend.append(&data).and_then(|offset| {
            backend.flush()?;
            if self.sync_on_commit {
                backend.sync()?;
            }
            Ok(offset)
        });

        match result {
            Ok(offset) => {
                debug!(version = %record.version, offset, len = data.len(), "commit appended");
                Ok(offset)
            }
            Err(err) => {
                warn!(error = %err, "history append failed; restoring log length");
                backend.truncate(start).map_err(|restore| {
                    CoreError::fatal(format!(
                        "history log left inconsistent: append failed ({err}) and restore failed ({restore})"
                    ))
                })?;
                Err(err.into())
            }
        }
    }

    /// Current log length in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }
}
