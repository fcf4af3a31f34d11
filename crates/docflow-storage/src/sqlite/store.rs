//! [`SqliteStore`]: the workspace database behind the [`Storage`](crate::traits::Storage) trait.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::sqlite::metadata::put_metadata;
use crate::sqlite::schema::{CURRENT_SCHEMA_VERSION, MIGRATIONS, SCHEMA_STATEMENTS, SCHEMA_VERSION_KEY};

/// A single SQLite connection shared by the engine and the CLI.
///
/// Every operation takes the mutex for the duration of its statements, so a
/// document transition never interleaves with another on the same store.
pub struct SqliteStore {
    pub(crate) conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens the database at `path`, creating the file and the docflow
    /// tables when missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(db = %path.display(), "opening docflow database");
        let conn = Connection::open(path).map_err(|e| {
            StorageError::Connection(format!("cannot open {}: {e}", path.display()))
        })?;
        Self::prepare(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Connection(format!("cannot open in-memory database: {e}")))?;
        Self::prepare(conn)
    }

    fn prepare(conn: Connection) -> Result<Self> {
        // WAL lets `docflow remind` read while a transition is committing.
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| StorageError::Connection(format!("cannot configure connection: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Brings the schema up to [`CURRENT_SCHEMA_VERSION`]. A database that
    /// already records that version is left alone.
    fn migrate(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        let stored = stored_schema_version(&conn);
        if stored >= CURRENT_SCHEMA_VERSION {
            debug!(version = stored, "schema up to date");
            return Ok(());
        }

        for stmt in SCHEMA_STATEMENTS {
            conn.execute_batch(stmt).map_err(|e| StorageError::Migration {
                name: "schema".into(),
                reason: format!("{e} (in `{}`)", statement_head(stmt)),
            })?;
        }
        for &(name, sql) in MIGRATIONS {
            apply_migration(&conn, name, sql)?;
        }
        put_metadata(&conn, SCHEMA_VERSION_KEY, &CURRENT_SCHEMA_VERSION.to_string())?;

        info!(from = stored, to = CURRENT_SCHEMA_VERSION, "docflow schema migrated");
        Ok(())
    }

    pub(crate) fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Connection(format!("database lock poisoned: {e}")))
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

/// The recorded schema version, 0 for a fresh file.
fn stored_schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        params![SCHEMA_VERSION_KEY],
        |row| row.get::<_, String>(0),
    )
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(0)
}

fn apply_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    let key = format!("migration:{name}");
    let applied: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM metadata WHERE key = ?1)",
            params![key],
            |row| row.get(0),
        )
        .map_err(|e| StorageError::Migration {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    if applied {
        return Ok(());
    }

    debug!(name, "applying migration");
    conn.execute_batch(sql).map_err(|e| StorageError::Migration {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    put_metadata(conn, &key, "applied")
}

/// First non-blank line of a DDL statement, for error messages.
fn statement_head(stmt: &str) -> &str {
    stmt.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_records_schema_and_migrations() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        assert_eq!(stored_schema_version(&conn), CURRENT_SCHEMA_VERSION);

        let applied: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM metadata WHERE key LIKE 'migration:%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(applied as usize, MIGRATIONS.len());
    }

    #[test]
    fn no_settings_are_seeded() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.lock_conn().unwrap();
        let keys: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM metadata WHERE key NOT LIKE 'migration:%' AND key != ?1",
                params![SCHEMA_VERSION_KEY],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(keys, 0);
    }

    #[test]
    fn migrate_twice_is_harmless() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.migrate().unwrap();
    }

    #[test]
    fn reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docflow.db");
        drop(SqliteStore::open(&path).unwrap());
        let store = SqliteStore::open(&path).unwrap();
        let conn = store.lock_conn().unwrap();
        assert_eq!(stored_schema_version(&conn), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn statement_head_skips_blank_lines() {
        assert_eq!(statement_head("\n    CREATE TABLE x (\n a )"), "CREATE TABLE x (");
        assert_eq!(statement_head("CREATE INDEX i ON t(c)"), "CREATE INDEX i ON t(c)");
    }
}
