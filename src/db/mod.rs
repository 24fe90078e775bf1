// Database module
// One lazily-opened, cached connection per handle. Commands and the CLI share
// a single `Database` for the process lifetime; tests point one at a tempdir.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, Transaction};

use crate::constants::{BOOKVAULT_FOLDER, DB_FILENAME};
use crate::error::{Result, VaultError};

/// Default database location: ~/.bookvault/bookvault.db
pub fn default_db_path() -> Result<PathBuf> {
    let base = directories::BaseDirs::new().ok_or_else(|| {
        VaultError::StorageUnavailable("could not determine home directory".to_string())
    })?;
    Ok(base.home_dir().join(BOOKVAULT_FOLDER).join(DB_FILENAME))
}

/// Open a connection with pragmas set and migrations applied.
fn open_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            VaultError::StorageUnavailable(format!(
                "cannot create database directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let conn = Connection::open(db_path).map_err(|e| {
        VaultError::StorageUnavailable(format!(
            "cannot open database at {}: {}",
            db_path.display(),
            e
        ))
    })?;

    // Foreign keys must be enabled per connection. A corrupt file fails
    // here, on the first statement that touches the header.
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;",
    )
    .map_err(|e| {
        VaultError::StorageUnavailable(format!(
            "cannot initialize database at {}: {}",
            db_path.display(),
            e
        ))
    })?;

    migrations::run_migrations(&conn)
        .map_err(|e| VaultError::StorageUnavailable(e.to_string()))?;

    Ok(conn)
}

/// Handle to the on-disk store. The connection is opened on first use and
/// cached until `close()`; a later operation reopens lazily.
pub struct Database {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl Database {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            conn: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open eagerly. Equivalent to the first `with_conn` call; repeated calls
    /// are no-ops while the cached connection is live.
    pub fn open(&self) -> Result<()> {
        self.with_conn(|_| Ok(()))
    }

    /// Drop the cached connection. The next operation reopens lazily.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock()?;
        *guard = None;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn.lock().map_err(|_| {
            VaultError::StorageUnavailable("database lock poisoned".to_string())
        })
    }

    /// Run `f` against the live connection, opening it first if needed.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        if guard.is_none() {
            *guard = Some(open_db(&self.path)?);
        }
        let conn = guard.as_ref().ok_or_else(|| {
            VaultError::StorageUnavailable("database connection unavailable".to_string())
        })?;
        f(conn)
    }

    /// Like `with_conn` but with mutable access, for callers that manage
    /// their own transaction or connection-level pragmas.
    pub fn with_conn_mut<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        if guard.is_none() {
            *guard = Some(open_db(&self.path)?);
        }
        let conn = guard.as_mut().ok_or_else(|| {
            VaultError::StorageUnavailable("database connection unavailable".to_string())
        })?;
        f(conn)
    }

    /// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`.
    pub fn with_tx<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("bookvault.db"));

        db.open().unwrap();
        db.open().unwrap();

        let version = db
            .with_conn(|conn| Ok(migrations::schema_version(conn)?))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_close_then_reopen_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("bookvault.db"));

        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO books (title, created_at, updated_at) VALUES ('Dune', 0, 0)",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        db.close().unwrap();

        // Next operation reopens against the same file
        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_failed_tx_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("bookvault.db"));

        let result: Result<()> = db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO books (title, created_at, updated_at) VALUES ('Dune', 0, 0)",
                [],
            )?;
            Err(VaultError::Other("boom".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0, "rolled-back insert must not be visible");
    }

    #[test]
    fn test_open_fails_on_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookvault.db");
        std::fs::write(&path, b"this is not a sqlite database, not even close").unwrap();

        let db = Database::new(path);
        let err = db.open().unwrap_err();
        assert!(matches!(err, VaultError::StorageUnavailable(_)));
    }
}
