//! SQLite-backed database
//!
//! Entries live in a single `kv` table keyed by blob. Writes open a
//! transaction lazily and [`Database::sync`] commits it, so nothing reaches
//! the file between flushes and a crash rolls back to the last sync.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};

use super::database::Database;

const SCHEMA: &str = "
    PRAGMA synchronous = FULL;
    CREATE TABLE IF NOT EXISTS kv (
        key   BLOB PRIMARY KEY NOT NULL,
        value BLOB NOT NULL
    ) WITHOUT ROWID;
";

/// Database persisted to a single SQLite file
#[derive(Debug)]
pub struct FileDatabase {
    path: PathBuf,
    conn: Connection,
}

fn db_err(e: rusqlite::Error) -> io::Error {
    let kind = match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => io::ErrorKind::AlreadyExists,
        Some(ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt) => io::ErrorKind::InvalidData,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, e)
}

impl FileDatabase {
    /// Open the database at `path`
    ///
    /// With `create` set, a missing file and its parent directories are
    /// created. Otherwise a missing file is [`io::ErrorKind::NotFound`].
    pub fn open(path: impl AsRef<Path>, create: bool) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if create {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        } else if !path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no database at {}", path.display()),
            ));
        }

        let conn = Connection::open_with_flags(&path, flags).map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        let db = Self { path, conn };
        tracing::debug!(path = %db.path.display(), keys = db.count(), "Database loaded");
        Ok(db)
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn count(&self) -> i64 {
        self.conn
            .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))
            .unwrap_or(0)
    }

    fn begin(&mut self) -> io::Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN IMMEDIATE").map_err(db_err)?;
        }
        Ok(())
    }

    fn key_after(&self, sql: &str, key: Option<&[u8]>) -> Option<Vec<u8>> {
        let result = match key {
            Some(key) => self
                .conn
                .query_row(sql, params![key], |row| row.get(0))
                .optional(),
            None => self.conn.query_row(sql, [], |row| row.get(0)).optional(),
        };
        result.unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Key scan failed");
            None
        })
    }
}

impl Database for FileDatabase {
    fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.conn
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
            .unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), error = %e, "Lookup failed");
                None
            })
            .map(Bytes::from)
    }

    fn set(&mut self, key: &[u8], value: &[u8], create_only: bool) -> io::Result<()> {
        self.begin()?;
        let sql = if create_only {
            "INSERT INTO kv (key, value) VALUES (?1, ?2)"
        } else {
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)"
        };
        self.conn.execute(sql, params![key, value]).map_err(db_err)?;
        Ok(())
    }

    fn unset(&mut self, key: &[u8]) -> io::Result<()> {
        self.begin()?;
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(db_err)?;
        Ok(())
    }

    fn first(&self) -> Option<Vec<u8>> {
        self.key_after("SELECT key FROM kv ORDER BY key LIMIT 1", None)
    }

    fn next(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.key_after(
            "SELECT key FROM kv WHERE key > ?1 ORDER BY key LIMIT 1",
            Some(key),
        )
    }

    fn sync(&mut self) -> io::Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT").map_err(db_err)?;
        }
        Ok(())
    }
}
