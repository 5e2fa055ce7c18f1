// SQLite persistence layer for the client session.
//
// Plays the role the browser's localStorage plays in a web client: a small
// durable key/value store holding the access token, refresh token, and the
// serialized user profile across process restarts.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Durable storage key for the access token.
pub const KEY_ACCESS_TOKEN: &str = "access_token";
/// Durable storage key for the refresh token.
pub const KEY_REFRESH_TOKEN: &str = "refresh_token";
/// Durable storage key for the serialized user profile.
pub const KEY_USER_INFO: &str = "user_info";

/// SQLite-backed key/value storage for session state.
pub struct SessionStorage {
    conn: Mutex<Connection>,
}

impl SessionStorage {
    /// Open (or create) the session database at `path` and ensure the table
    /// exists. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open session storage at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set session storage pragmas")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS session (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .context("failed to create session storage schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open the session database at the platform-default location
    /// (the OS data directory for the application).
    pub fn open_default() -> Result<Self> {
        let path = default_path()?;
        Self::open(path.to_str().context("session storage path is not valid UTF-8")?)
    }

    /// Acquire the storage connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("session storage mutex poisoned")
    }

    /// Read a single value. Returns `None` for absent keys.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT value FROM session WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("failed to read session key `{key}`"))
    }

    /// Write a single value, replacing any previous one.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO session (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .with_context(|| format!("failed to write session key `{key}`"))?;
        Ok(())
    }

    /// Write several key/value pairs in one transaction. Either every pair
    /// lands or none does, so readers never observe a half-written session.
    pub fn set_many(&self, pairs: &[(&str, &str)]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .context("failed to begin session storage transaction")?;
        for (key, value) in pairs {
            tx.execute(
                "INSERT INTO session (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .with_context(|| format!("failed to write session key `{key}`"))?;
        }
        tx.commit()
            .context("failed to commit session storage transaction")?;
        Ok(())
    }

    /// Remove a single key. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM session WHERE key = ?1", params![key])
            .with_context(|| format!("failed to remove session key `{key}`"))?;
        Ok(())
    }

    /// Remove every stored key.
    pub fn clear(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM session", [])
            .context("failed to clear session storage")?;
        Ok(())
    }
}

/// Resolve the default on-disk location for the session database, creating
/// the parent directory if needed.
pub fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "prepdesk", "prepdesk-client")
        .context("failed to resolve platform data directory")?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
    Ok(data_dir.join("session.db"))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
