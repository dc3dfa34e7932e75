use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;
use crate::schema;

/// Thread-safe SQLite connection wrapper.
/// Clones share one connection, so every store and log opened on the same
/// file serialise on the same mutex.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("create dir: {e}")))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute_batch(schema::PRAGMAS)
            .map_err(|e| StoreError::Database(format!("pragmas: {e}")))?;

        info!(path = %path.display(), "database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_owned(),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute_batch(schema::PRAGMAS)
            .map_err(|e| StoreError::Database(format!("pragmas: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
        })
    }

    /// Execute a closure with the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Execute a closure inside one transaction. Commits when the closure
    /// returns `Ok`; any error rolls back everything it did.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T, StoreError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        // Dropping `tx` without commit rolls back.
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            path: self.path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.path(), Path::new(":memory:"));
    }

    #[test]
    fn open_file_database_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("fix.db");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());

        // Open again, should not fail
        let db2 = Database::open(&path).unwrap();
        drop(db);
        drop(db2);
    }

    #[test]
    fn wal_mode_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("wal.db")).unwrap();
        let mode: String = db
            .with_conn(|conn| Ok(conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn writers_wait_for_locks() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("busy.db")).unwrap();
        let timeout: i64 = db
            .with_conn(|conn| Ok(conn.query_row("PRAGMA busy_timeout", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(timeout, 5000);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch("CREATE TABLE t (v INTEGER NOT NULL)")?;
            Ok(())
        })
        .unwrap();

        let result: Result<(), StoreError> = db.with_transaction(|tx| {
            let _ = tx.execute("INSERT INTO t (v) VALUES (1)", [])?;
            Err(StoreError::Database("boom".into()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn transaction_commits_on_ok() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch("CREATE TABLE t (v INTEGER NOT NULL)")?;
            Ok(())
        })
        .unwrap();

        db.with_transaction(|tx| {
            let _ = tx.execute("INSERT INTO t (v) VALUES (1)", [])?;
            let _ = tx.execute("INSERT INTO t (v) VALUES (2)", [])?;
            Ok(())
        })
        .unwrap();

        let count: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(count, 2);
    }
}
