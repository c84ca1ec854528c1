//! CLI command implementations.

pub mod dump_history;
pub mod inspect;
pub mod verify;

use columba_core::HISTORY_FILE;
use columba_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::path::Path;

/// Loads the history log of the database at `path` into memory.
///
/// Commands work on the copy so that replay never truncates the real file.
pub fn load_history(path: &Path) -> Result<InMemoryBackend, Box<dyn std::error::Error>> {
    let history_path = path.join(HISTORY_FILE);
    if !history_path.exists() {
        return Err(format!("No database found at {}", path.display()).into());
    }
    let file = FileBackend::open(&history_path)?;
    let size = file.size()?;
    let data = file.read_at(0, usize::try_from(size)?)?;
    Ok(InMemoryBackend::with_data(data))
}
