mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use schema::INITIAL_SCHEMA;

/// SQLite store behind the taxonomy adapter.
///
/// Every open runs the idempotent schema with foreign keys enforced, so term
/// usage rows cannot outlive their term.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn in_memory() -> Result<Self> {
        Self::with_schema(Connection::open_in_memory()?)
    }

    /// Opens the database file at `path`, creating it if missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite file {}", path.display()))?;
        Self::with_schema(conn)
    }

    fn with_schema(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(INITIAL_SCHEMA)
            .context("Failed to apply taxonomy schema")?;
        Ok(Self { conn })
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
