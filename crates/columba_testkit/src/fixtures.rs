//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases
//! and common test scenarios.

use columba_core::{ColKey, ColumnType, Config, CoreResult, Database, ObjKey, WriteTransaction};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    temp_dir: Option<TempDir>,
}

impl TestDatabase {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self::memory_with_config(Config::default())
    }

    /// Creates an in-memory test database with custom limits.
    pub fn memory_with_config(config: Config) -> Self {
        Self {
            db: Database::in_memory_with_config(config).expect("Failed to open in-memory database"),
            temp_dir: None,
        }
    }

    /// Creates a new file-based test database.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open(&temp_dir.path().join("db")).expect("Failed to open file database");
        Self {
            db,
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the database directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().join("db"))
    }

    /// Closes and reopens a file-based database, replaying its history.
    pub fn reopen(self) -> Self {
        let Self { db, temp_dir } = self;
        let temp_dir = temp_dir.expect("Only file databases can be reopened");
        drop(db);
        let db = Database::open(&temp_dir.path().join("db")).expect("Failed to reopen database");
        Self {
            db,
            temp_dir: Some(temp_dir),
        }
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a temporary in-memory database.
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.db)
}

/// Runs a test with a temporary file-based database.
pub fn with_file_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database, &Path) -> R,
{
    let test_db = TestDatabase::file();
    let path = test_db.path().expect("File database should have a path");
    f(&test_db.db, &path)
}

/// Column keys of the `class_Person` table used across tests.
#[derive(Debug, Clone, Copy)]
pub struct PersonSchema {
    /// Non-nullable int.
    pub age: ColKey,
    /// Nullable string.
    pub name: ColKey,
    /// Nullable timestamp.
    pub born: ColKey,
    /// Link to another person.
    pub best_friend: ColKey,
    /// Link list of people.
    pub friends: ColKey,
    /// Nullable list of strings.
    pub nicknames: ColKey,
}

impl PersonSchema {
    /// Table name.
    pub const TABLE: &'static str = "class_Person";

    /// Creates the table in its own committed transaction.
    pub fn create(db: &Database) -> CoreResult<Self> {
        db.write(|txn| Self::create_in(txn))
    }

    /// Creates the table inside `txn`.
    pub fn create_in(txn: &WriteTransaction) -> CoreResult<Self> {
        let t = txn.add_table(Self::TABLE)?;
        Ok(Self {
            age: t.add_column("age", ColumnType::Int, false)?,
            name: t.add_column("name", ColumnType::String, true)?,
            born: t.add_column("born", ColumnType::Timestamp, true)?,
            best_friend: t.add_link_column("bestFriend", &t)?,
            friends: t.add_link_list_column("friends", &t)?,
            nicknames: t.add_list_column("nicknames", ColumnType::String, true)?,
        })
    }

    /// Inserts people named `p0..pN` with ages `0..N` and returns their keys.
    pub fn populate(&self, db: &Database, count: usize) -> CoreResult<Vec<ObjKey>> {
        db.write(|txn| {
            let t = txn.require_table(Self::TABLE)?;
            (0..count)
                .map(|i| -> CoreResult<ObjKey> {
                    let obj = t.create_object()?;
                    obj.set(self.age, i as i64)?;
                    obj.set(self.name, format!("p{i}"))?;
                    Ok(obj.key())
                })
                .collect()
        })
    }
}

/// Creates a database holding `count` people.
pub fn populated_database(count: usize) -> (TestDatabase, PersonSchema) {
    let db = TestDatabase::memory();
    let schema = PersonSchema::create(&db).expect("Failed to create schema");
    schema.populate(&db, count).expect("Failed to populate");
    (db, schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_fixture() {
        let (db, schema) = populated_database(3);
        let txn = db.begin_read();
        let t = txn.require_table(PersonSchema::TABLE).unwrap();
        assert_eq!(t.size().unwrap(), 3);
        assert_eq!(t.find_first(schema.age, 2).unwrap(), Some(ObjKey::new(2)));
    }

    #[test]
    fn file_fixture_reopens() {
        let db = TestDatabase::file();
        PersonSchema::create(&db).unwrap();
        let db = db.reopen();
        assert!(db.read(|txn| Ok(txn.has_table(PersonSchema::TABLE))).unwrap());
        assert!(db.path().is_some());
    }
}
