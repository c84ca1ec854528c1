//! Dump-history command implementation.

use crate::OutputFormat;
use columba_core::history::{read_records, CommitRecord};
use columba_storage::StorageBackend;
use serde::Serialize;
use std::path::Path;

use super::load_history;

/// One committed change set.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Offset in the history file.
    pub offset: u64,
    /// Version the commit produced.
    pub version: u64,
    /// Instructions in commit order.
    pub instructions: Vec<InstructionInfo>,
}

/// One instruction of a change set.
#[derive(Debug, Serialize)]
pub struct InstructionInfo {
    /// Operation name.
    pub op: &'static str,
    /// Full instruction.
    pub detail: String,
}

impl RecordInfo {
    fn new(offset: u64, record: &CommitRecord) -> Self {
        Self {
            offset,
            version: record.version.as_u64(),
            instructions: record
                .instructions
                .iter()
                .map(|i| InstructionInfo {
                    op: i.op_name(),
                    detail: format!("{i:?}"),
                })
                .collect(),
        }
    }
}

/// Runs the dump-history command.
pub fn run(
    path: &Path,
    limit: Option<usize>,
    from_version: u64,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = load_history(path)?;
    let records = collect(&backend, limit, from_version)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Text => print_text_output(&records),
    }
    Ok(())
}

/// Reads records at or after `from_version`, up to `limit`.
pub fn collect(
    backend: &dyn StorageBackend,
    limit: Option<usize>,
    from_version: u64,
) -> Result<Vec<RecordInfo>, Box<dyn std::error::Error>> {
    let max = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();
    read_records(backend, |offset, record| {
        if record.version.as_u64() >= from_version && records.len() < max {
            records.push(RecordInfo::new(offset, &record));
        }
        Ok(())
    })?;
    Ok(records)
}

fn print_text_output(records: &[RecordInfo]) {
    for record in records {
        println!(
            "[{:>8}] version {} ({} instructions)",
            record.offset,
            record.version,
            record.instructions.len()
        );
        for instruction in &record.instructions {
            println!("    {:<14} {}", instruction.op, instruction.detail);
        }
    }
    println!();
    println!("Total: {} records", records.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use columba_core::{ColumnType, Config, Database};
    use columba_storage::InMemoryBackend;

    #[test]
    fn collects_commits_in_order() {
        let backend = InMemoryBackend::new();
        let db = Database::open_with_backend(Box::new(backend.share()), Config::default()).unwrap();
        db.write(|txn| {
            let t = txn.add_table("t")?;
            t.add_column("n", ColumnType::Int, false)?;
            Ok(())
        })
        .unwrap();
        db.write(|txn| txn.require_table("t")?.create_object().map(drop))
            .unwrap();

        let all = collect(&backend, None, 0).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].offset, 0);
        assert_eq!(all[0].instructions.len(), 2);
        assert_eq!(all[1].version, 2);

        let later = collect(&backend, Some(5), 2).unwrap();
        assert_eq!(later.len(), 1);
        assert_eq!(collect(&backend, Some(1), 0).unwrap().len(), 1);
    }
}
