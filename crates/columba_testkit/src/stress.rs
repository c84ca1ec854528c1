//! Stress drivers for concurrent access.
//!
//! The ledger workload keeps one invariant in every committed version:
//! the `amount` column sums to zero. Each commit adds a balanced pair of
//! rows or removes one. Readers check the invariant on every snapshot
//! they see, before and after advancing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use columba_core::{ColKey, ColumnType, CoreResult, Database, Transaction, VersionId};

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Commits the writer performs.
    pub commits: usize,
    /// Concurrent reader threads.
    pub readers: usize,
    /// Remove a pair on every n-th commit.
    pub remove_every: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            commits: 500,
            readers: 4,
            remove_every: 3,
        }
    }
}

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressReport {
    /// Commits performed.
    pub commits: usize,
    /// Snapshots checked by readers.
    pub snapshots_checked: usize,
    /// Advances that moved a reader forward.
    pub advances: usize,
    /// Invariant violations, empty on success.
    pub violations: Vec<String>,
    /// Wall time.
    pub duration: Duration,
}

impl StressReport {
    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Commits: {}", self.commits);
        println!("Snapshots checked: {}", self.snapshots_checked);
        println!("Advances: {}", self.advances);
        println!("Violations: {}", self.violations.len());
        println!("Duration: {:?}", self.duration);
    }
}

const LEDGER: &str = "ledger";

fn ledger_sum(txn: &Transaction, amount: ColKey) -> CoreResult<(i64, usize)> {
    let t = txn.require_table(LEDGER)?;
    let mut sum = 0i64;
    let keys = t.keys()?;
    for key in &keys {
        sum += t.object(*key)?.get_int(amount)?.unwrap_or_default();
    }
    Ok((sum, keys.len()))
}

/// Runs the ledger workload: one writer, `config.readers` readers.
pub fn run_ledger_stress(db: &Database, config: &StressConfig) -> CoreResult<StressReport> {
    let amount = db.write(|txn| {
        let t = txn.add_table(LEDGER)?;
        t.add_column("amount", ColumnType::Int, false)
    })?;

    let done = AtomicBool::new(false);
    let checked = AtomicUsize::new(0);
    let advances = AtomicUsize::new(0);
    let start = Instant::now();

    let (commits, mut violations) = thread::scope(|scope| {
        let readers: Vec<_> = (0..config.readers)
            .map(|_| {
                scope.spawn(|| {
                    let mut violations = Vec::new();
                    let mut txn = db.begin_read();
                    let mut last = txn.version();
                    loop {
                        let finished = done.load(Ordering::Acquire);
                        match ledger_sum(&txn, amount) {
                            Ok((0, rows)) if rows % 2 == 0 => {}
                            Ok((sum, rows)) => violations
                                .push(format!("version {last}: sum {sum} over {rows} rows")),
                            Err(err) => violations.push(format!("version {last}: {err}")),
                        }
                        checked.fetch_add(1, Ordering::Relaxed);
                        if finished {
                            break;
                        }
                        if txn.advance() {
                            advances.fetch_add(1, Ordering::Relaxed);
                        }
                        if txn.version() < last {
                            violations.push(format!(
                                "version went back from {last} to {}",
                                txn.version()
                            ));
                        }
                        last = txn.version();
                    }
                    violations
                })
            })
            .collect();

        let mut commits = 0usize;
        let mut violations = Vec::new();
        for i in 0..config.commits {
            let result = db.write(|txn| {
                let t = txn.require_table(LEDGER)?;
                let keys = t.keys()?;
                if config.remove_every > 0 && i % config.remove_every == 0 && keys.len() >= 2 {
                    // pairs are created together, so the two oldest keys balance
                    t.remove_object(keys[0])?;
                    t.remove_object(keys[1])?;
                } else {
                    let v = i as i64 + 1;
                    t.create_object()?.set(amount, v)?;
                    t.create_object()?.set(amount, -v)?;
                }
                Ok(())
            });
            match result {
                Ok(()) => commits += 1,
                Err(err) => violations.push(format!("commit {i}: {err}")),
            }
        }
        done.store(true, Ordering::Release);

        for reader in readers {
            match reader.join() {
                Ok(found) => violations.extend(found),
                Err(_) => violations.push("reader panicked".to_string()),
            }
        }
        (commits, violations)
    });

    // the final state must also balance
    let final_txn = db.begin_read();
    if final_txn.version() != VersionId::new(commits as u64 + 1) {
        violations.push(format!("unexpected final version {}", final_txn.version()));
    }
    if let Ok((sum, _)) = ledger_sum(&final_txn, amount) {
        if sum != 0 {
            violations.push(format!("final sum {sum}"));
        }
    }

    Ok(StressReport {
        commits,
        snapshots_checked: checked.load(Ordering::Relaxed),
        advances: advances.load(Ordering::Relaxed),
        violations,
        duration: start.elapsed(),
    })
}

/// Runs `threads` writers that each commit `per_thread` single-row inserts.
///
/// Returns the number of rows in the final version, which must equal
/// `threads * per_thread` if writers were serialized correctly.
pub fn run_contended_writers(
    db: &Database,
    threads: usize,
    per_thread: usize,
) -> CoreResult<usize> {
    db.write(|txn| txn.get_or_add_table("counter").map(drop))?;
    thread::scope(|scope| -> CoreResult<()> {
        let workers: Vec<_> = (0..threads)
            .map(|_| {
                scope.spawn(|| -> CoreResult<()> {
                    for _ in 0..per_thread {
                        db.write(|txn| txn.require_table("counter")?.create_object().map(drop))?;
                    }
                    Ok(())
                })
            })
            .collect();
        for worker in workers {
            worker
                .join()
                .map_err(|_| columba_core::CoreError::runtime("writer thread panicked"))??;
        }
        Ok(())
    })?;
    db.read(|txn| txn.require_table("counter")?.size())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_ledger_run_is_clean() {
        let db = Database::open_in_memory().unwrap();
        let config = StressConfig {
            commits: 50,
            readers: 2,
            remove_every: 4,
        };
        let report = run_ledger_stress(&db, &config).unwrap();
        assert!(report.violations.is_empty(), "{:?}", report.violations);
        assert_eq!(report.commits, 50);
        assert!(report.snapshots_checked >= 2);
    }
}
