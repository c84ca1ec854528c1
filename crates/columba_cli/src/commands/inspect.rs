//! Inspect command implementation.

use crate::OutputFormat;
use columba_core::{Config, Database, ReadTransaction, TableRef};
use columba_storage::StorageBackend;
use serde::Serialize;
use std::path::Path;

use super::load_history;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database path.
    pub path: String,
    /// Latest committed version.
    pub version: u64,
    /// History file size in bytes.
    pub history_size: u64,
    /// Per-table summary.
    pub tables: Vec<TableSummary>,
}

/// Summary of one table.
#[derive(Debug, Serialize)]
pub struct TableSummary {
    /// Table name.
    pub name: String,
    /// Number of objects.
    pub objects: usize,
    /// Number of columns.
    pub column_count: usize,
    /// Column declarations (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnSummary>>,
}

/// One column declaration.
#[derive(Debug, Serialize)]
pub struct ColumnSummary {
    /// Column name.
    pub name: String,
    /// Column key.
    pub key: i64,
    /// Type name.
    #[serde(rename = "type")]
    pub column_type: String,
    /// Whether the column (or its elements) accepts null.
    pub nullable: bool,
    /// Whether the column holds lists.
    pub list: bool,
    /// Target table of a link column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    show_columns: bool,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = load_history(path)?;
    let history_size = backend.size()?;
    let db = Database::open_with_backend(Box::new(backend), Config::default())?;

    let txn = db.begin_read();
    let result = InspectResult {
        path: path.display().to_string(),
        version: txn.version().as_u64(),
        history_size,
        tables: summarize(&txn, show_columns)?,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_text_output(&result),
    }
    Ok(())
}

/// Summarizes every table visible to `txn`.
pub fn summarize(
    txn: &ReadTransaction,
    show_columns: bool,
) -> Result<Vec<TableSummary>, Box<dyn std::error::Error>> {
    let mut tables = Vec::new();
    for name in txn.table_names() {
        let table = txn.require_table(&name)?;
        let keys = table.column_keys()?;
        let columns = if show_columns {
            Some(describe_columns(&table)?)
        } else {
            None
        };
        tables.push(TableSummary {
            name,
            objects: table.size()?,
            column_count: keys.len(),
            columns,
        });
    }
    Ok(tables)
}

fn describe_columns(table: &TableRef) -> Result<Vec<ColumnSummary>, Box<dyn std::error::Error>> {
    let mut columns = Vec::new();
    for key in table.column_keys()? {
        let spec = table.column_spec(key)?;
        let target = match table.link_target(key)? {
            Some(target) => Some(target.name()?),
            None => None,
        };
        columns.push(ColumnSummary {
            name: spec.name().to_string(),
            key: key.value(),
            column_type: spec.column_type().name().to_string(),
            nullable: spec.is_nullable(),
            list: spec.is_list(),
            target,
        });
    }
    Ok(columns)
}

fn print_text_output(result: &InspectResult) {
    println!("Database: {}", result.path);
    println!("Version:  {}", result.version);
    println!("History:  {} bytes", result.history_size);
    println!("Tables:   {}", result.tables.len());
    for table in &result.tables {
        println!();
        println!(
            "  {} ({} objects, {} columns)",
            table.name, table.objects, table.column_count
        );
        for column in table.columns.iter().flatten() {
            let mut flags = Vec::new();
            if column.list {
                flags.push("list");
            }
            if column.nullable {
                flags.push("nullable");
            }
            let target = column
                .target
                .as_deref()
                .map(|t| format!(" -> {t}"))
                .unwrap_or_default();
            println!(
                "    {:<20} {:<10}{} [{}]",
                column.name,
                column.column_type,
                target,
                flags.join(", ")
            );
        }
    }
}
