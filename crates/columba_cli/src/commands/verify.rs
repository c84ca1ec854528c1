//! Verify command implementation.

use crate::OutputFormat;
use columba_core::history::read_records;
use columba_core::{Config, Database};
use columba_storage::{InMemoryBackend, StorageBackend};
use serde::Serialize;
use std::path::Path;

use super::load_history;

/// Verification result.
#[derive(Debug, Default, Serialize)]
pub struct VerifyResult {
    /// Number of complete, checksummed records.
    pub records: usize,
    /// Bytes covered by those records.
    pub valid_bytes: u64,
    /// Trailing bytes of an incomplete record.
    pub torn_tail: u64,
    /// Version the history replays to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replayed_version: Option<u64>,
    /// Problems found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    /// Whether the history is fully usable. A torn tail is not an error.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let backend = load_history(path)?;
    let result = verify(&backend)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_result(path, &result),
    }

    if result.is_ok() {
        Ok(())
    } else {
        Err("Verification failed".into())
    }
}

/// Checks framing and checksums, then replays the history.
pub fn verify(backend: &InMemoryBackend) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();

    let mut gaps = Vec::new();
    let mut last_version = 0u64;
    let outcome = read_records(backend, |offset, record| {
        let version = record.version.as_u64();
        if version != last_version + 1 {
            gaps.push(format!(
                "Version gap at offset {offset}: expected {}, found {version}",
                last_version + 1
            ));
        }
        last_version = version;
        Ok(())
    });
    result.errors = gaps;
    match outcome {
        Ok(summary) => {
            result.records = summary.records;
            result.valid_bytes = summary.valid_len;
            result.torn_tail = summary.torn_tail;
        }
        Err(err) => {
            result.errors.push(err.to_string());
            return Ok(result);
        }
    }

    if result.errors.is_empty() {
        let copy = InMemoryBackend::with_data(backend.data());
        match Database::open_with_backend(Box::new(copy), Config::default()) {
            Ok(db) => result.replayed_version = Some(db.version().as_u64()),
            Err(err) => result.errors.push(format!("Replay failed: {err}")),
        }
    }

    let size = backend.size()?;
    tracing::debug!(size, records = result.records, "history verified");
    Ok(result)
}

fn print_result(path: &Path, result: &VerifyResult) {
    println!("Verifying database at {}", path.display());
    println!();
    println!("  Records:     {}", result.records);
    println!("  Valid bytes: {}", result.valid_bytes);
    if result.torn_tail > 0 {
        println!("  Torn tail:   {} bytes (dropped on next open)", result.torn_tail);
    }
    if let Some(version) = result.replayed_version {
        println!("  Replays to:  version {version}");
    }
    for error in &result.errors {
        println!("  Error: {error}");
    }
    println!();
    if result.is_ok() {
        println!("Verification passed");
    } else {
        println!("Verification failed");
    }
}
