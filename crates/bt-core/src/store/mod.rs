//! SQLite persistence for customers, conversations, messages, templates and the catalog

mod catalog;
mod conversations;
mod migrations;
mod templates;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rusqlite::types::Type;
use tracing::info;

use crate::{Error, Result};

pub use conversations::InboundRecord;

/// SQLite-backed store shared by the webhook and the admin API
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database file and apply pending migrations
    pub fn open(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        let applied = store.migrate()?;
        info!("Database ready at {} ({} migrations applied)", db_path, applied);
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Apply pending schema migrations, returning how many ran
    pub fn migrate(&self) -> Result<usize> {
        let mut conn = self.conn()?;
        migrations::migrate(&mut conn)
    }

    /// Current schema version
    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.conn()?;
        migrations::current_version(&conn)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Parse a stored RFC 3339 timestamp inside a row mapper
fn parse_ts(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a stored enum/JSON column inside a row mapper
fn parse_col<T, E>(idx: usize, parsed: std::result::Result<T, E>) -> rusqlite::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    parsed.map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store_is_migrated() {
        let store = Store::in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), migrations::LATEST_VERSION);
        assert_eq!(store.migrate().unwrap(), 0);
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bot.db");
        let store = Store::open(path.to_str().unwrap()).unwrap();
        assert!(path.exists());
        drop(store);

        // Reopening keeps the schema and does not re-run migrations
        let store = Store::open(path.to_str().unwrap()).unwrap();
        assert_eq!(store.migrate().unwrap(), 0);
    }

    #[test]
    fn test_open_rejects_newer_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "user_version", migrations::LATEST_VERSION + 1)
                .unwrap();
        }

        let err = Store::open(path.to_str().unwrap()).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
