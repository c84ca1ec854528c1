//! Reference model of a single table.
//!
//! The model applies the same [`RowOp`]s as the engine using plain
//! collections, so property tests can compare committed state.

use std::collections::BTreeMap;

use columba_core::{ColKey, ColumnType, CoreResult, Database, ObjKey, Transaction, WriteTransaction};

use crate::generators::{Batch, RowOp};

/// One row of the model table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Non-nullable int column.
    pub n: i64,
    /// Nullable string column.
    pub s: Option<String>,
}

/// In-memory reference for the model table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    rows: BTreeMap<i64, Row>,
    next_key: i64,
}

impl Model {
    fn select(&self, selector: usize) -> Option<i64> {
        if self.rows.is_empty() {
            return None;
        }
        self.rows.keys().nth(selector % self.rows.len()).copied()
    }

    /// Applies one operation.
    pub fn apply(&mut self, op: &RowOp) {
        match op {
            RowOp::Create => {
                self.rows.insert(self.next_key, Row { n: 0, s: None });
                self.next_key += 1;
            }
            RowOp::Remove(sel) => {
                if let Some(key) = self.select(*sel) {
                    self.rows.remove(&key);
                }
            }
            RowOp::SetInt(sel, v) => {
                if let Some(key) = self.select(*sel) {
                    if let Some(row) = self.rows.get_mut(&key) {
                        row.n = *v;
                    }
                }
            }
            RowOp::SetString(sel, v) => {
                if let Some(key) = self.select(*sel) {
                    if let Some(row) = self.rows.get_mut(&key) {
                        row.s.clone_from(v);
                    }
                }
            }
        }
    }

    /// Applies a batch if it commits.
    pub fn apply_batch(&mut self, batch: &Batch) {
        if batch.commit {
            batch.ops.iter().for_each(|op| self.apply(op));
        }
    }

    /// Rows by key.
    pub fn rows(&self) -> &BTreeMap<i64, Row> {
        &self.rows
    }
}

/// The engine side of the model table.
#[derive(Debug, Clone, Copy)]
pub struct ModelTable {
    n: ColKey,
    s: ColKey,
}

impl ModelTable {
    /// Table name.
    pub const TABLE: &'static str = "model";

    /// Creates the table in its own commit.
    pub fn create(db: &Database) -> CoreResult<Self> {
        db.write(|txn| {
            let t = txn.add_table(Self::TABLE)?;
            Ok(Self {
                n: t.add_column("n", ColumnType::Int, false)?,
                s: t.add_column("s", ColumnType::String, true)?,
            })
        })
    }

    fn select(keys: &[ObjKey], selector: usize) -> Option<ObjKey> {
        (!keys.is_empty()).then(|| keys[selector % keys.len()])
    }

    /// Applies one operation inside `txn`.
    pub fn apply(&self, txn: &WriteTransaction, op: &RowOp) -> CoreResult<()> {
        let t = txn.require_table(Self::TABLE)?;
        match op {
            RowOp::Create => {
                t.create_object()?;
            }
            RowOp::Remove(sel) => {
                if let Some(key) = Self::select(&t.keys()?, *sel) {
                    t.remove_object(key)?;
                }
            }
            RowOp::SetInt(sel, v) => {
                if let Some(key) = Self::select(&t.keys()?, *sel) {
                    t.object(key)?.set(self.n, *v)?;
                }
            }
            RowOp::SetString(sel, v) => {
                if let Some(key) = Self::select(&t.keys()?, *sel) {
                    t.object(key)?.set(self.s, v.clone())?;
                }
            }
        }
        Ok(())
    }

    /// Runs a batch in one write transaction, committing or rolling back.
    pub fn apply_batch(&self, db: &Database, batch: &Batch) -> CoreResult<()> {
        let mut txn = db.begin_write()?;
        for op in &batch.ops {
            self.apply(&txn, op)?;
        }
        if batch.commit {
            txn.commit()?;
        } else {
            txn.rollback()?;
        }
        Ok(())
    }

    /// Reads the table into model rows.
    pub fn read(&self, txn: &Transaction) -> CoreResult<BTreeMap<i64, Row>> {
        let t = txn.require_table(Self::TABLE)?;
        let mut rows = BTreeMap::new();
        for key in t.keys()? {
            let obj = t.object(key)?;
            rows.insert(
                key.value(),
                Row {
                    n: obj.get_int(self.n)?.unwrap_or_default(),
                    s: obj.get_string(self.s)?,
                },
            );
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_wrap() {
        let mut model = Model::default();
        model.apply(&RowOp::Remove(3));
        assert!(model.rows().is_empty());
        model.apply(&RowOp::Create);
        model.apply(&RowOp::Create);
        model.apply(&RowOp::SetInt(3, 9));
        assert_eq!(model.rows()[&1].n, 9);
    }

    #[test]
    fn engine_matches_model_for_fixed_batches() {
        let db = Database::open_in_memory().unwrap();
        let table = ModelTable::create(&db).unwrap();
        let mut model = Model::default();
        let batches = [
            Batch {
                ops: vec![RowOp::Create, RowOp::Create, RowOp::SetString(0, Some("x".into()))],
                commit: true,
            },
            Batch {
                ops: vec![RowOp::Remove(0), RowOp::Create],
                commit: false,
            },
            Batch {
                ops: vec![RowOp::Remove(0), RowOp::Create, RowOp::SetInt(1, -4)],
                commit: true,
            },
        ];
        for batch in &batches {
            table.apply_batch(&db, batch).unwrap();
            model.apply_batch(batch);
        }
        let rows = db.read(|txn| table.read(txn)).unwrap();
        assert_eq!(&rows, model.rows());
    }
}
