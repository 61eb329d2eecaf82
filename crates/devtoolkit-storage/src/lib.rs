//! Dev Toolkit Storage
//!
//! SQLite snippet persistence keyed by `(user_id, name)`

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub user_id: i64,
    pub name: String,
    pub code: String,
    pub timestamp: DateTime<Utc>,
}

pub struct Storage {
    conn: rusqlite::Connection,
}

impl Storage {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = rusqlite::Connection::open(db_path.as_ref())?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(rusqlite::Connection::open_in_memory()?)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS snippets (
                doc_id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                code TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_snippets_user
            ON snippets(user_id);
            ",
        )?;

        Ok(Self { conn })
    }

    /// Document key, one record per user and name.
    pub fn doc_id(user_id: i64, name: &str) -> String {
        format!("{}_{}", user_id, name)
    }

    pub fn save_snippet(&self, user_id: i64, name: &str, code: &str) -> Result<Snippet> {
        let timestamp = Utc::now();
        self.conn.execute(
            "INSERT INTO snippets (doc_id, user_id, name, code, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(doc_id)
             DO UPDATE SET code = excluded.code, timestamp = excluded.timestamp",
            (
                Self::doc_id(user_id, name),
                user_id,
                name,
                code,
                timestamp.timestamp_millis(),
            ),
        )?;

        Ok(Snippet {
            user_id,
            name: name.to_string(),
            code: code.to_string(),
            timestamp,
        })
    }

    pub fn get_snippet(&self, user_id: i64, name: &str) -> Result<Option<Snippet>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, name, code, timestamp FROM snippets WHERE doc_id = ?1 LIMIT 1",
        )?;
        let row: Option<(i64, String, String, i64)> = stmt
            .query_row([Self::doc_id(user_id, name)], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })
            .optional()?;

        row.map(|(user_id, name, code, millis)| {
            Ok(Snippet {
                user_id,
                name,
                code,
                timestamp: millis_to_utc(millis)?,
            })
        })
        .transpose()
    }

    pub fn list_snippet_names(&self, user_id: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM snippets WHERE user_id = ?1 ORDER BY name")?;
        let names = stmt
            .query_map([user_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Returns whether a record was removed.
    pub fn delete_snippet(&self, user_id: i64, name: &str) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM snippets WHERE doc_id = ?1",
            [Self::doc_id(user_id, name)],
        )?;
        Ok(deleted > 0)
    }

    pub fn count_snippets(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM snippets", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn millis_to_utc(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| anyhow!("invalid snippet timestamp {}", millis))
}
