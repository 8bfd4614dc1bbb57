use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use crate::memory::{FactRecord, FactStore};

/// SQLite-backed fact store. One row per `(user_id, memory_key)`.
pub struct FactDatabase {
    conn: Mutex<Connection>,
}

impl FactDatabase {
    /// Helper to lock the connection
    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Database lock poisoned: {}", e))
    }

    /// Create or open the database
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open fact database at {:?}", path))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.ensure_schema()?;
        Ok(db)
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS user_memory (
                user_id TEXT NOT NULL,
                memory_key TEXT NOT NULL,
                memory_value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, memory_key)
            );
            "#,
        )
        .context("Failed to create user_memory table")?;
        Ok(())
    }
}

impl FactStore for FactDatabase {
    fn get(&self, user_id: &str, key: &str) -> Result<Option<String>> {
        let conn = self.lock_conn()?;
        let value = conn
            .query_row(
                "SELECT memory_value FROM user_memory WHERE user_id = ?1 AND memory_key = ?2",
                params![user_id, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn get_all(&self, user_id: &str) -> Result<BTreeMap<String, String>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare("SELECT memory_key, memory_value FROM user_memory WHERE user_id = ?1")?;
        let facts = stmt
            .query_map([user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
        Ok(facts)
    }

    fn upsert(&self, user_id: &str, key: &str, value: &str) -> Result<Option<String>> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous: Option<String> = tx
            .query_row(
                "SELECT memory_value FROM user_memory WHERE user_id = ?1 AND memory_key = ?2",
                params![user_id, key],
                |row| row.get(0),
            )
            .optional()?;

        if previous.as_deref() != Some(value) {
            tx.execute(
                "INSERT INTO user_memory (user_id, memory_key, memory_value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, memory_key)
                 DO UPDATE SET memory_value = excluded.memory_value, updated_at = excluded.updated_at",
                params![user_id, key, value, Utc::now().to_rfc3339()],
            )?;
        }

        tx.commit()?;
        Ok(previous)
    }

    fn list_records(&self, user_id: &str) -> Result<Vec<FactRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT memory_key, memory_value, updated_at FROM user_memory
             WHERE user_id = ?1 ORDER BY memory_key ASC",
        )?;
        let records = stmt
            .query_map([user_id], |row| {
                Ok(FactRecord {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    updated_at: parse_rfc3339(row.get::<_, String>(2)?, 2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn parse_rfc3339(
    value: String,
    column: usize,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    value.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}
