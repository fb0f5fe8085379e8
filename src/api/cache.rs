//! On-disk cache for GET responses
//!
//! Only successful GET responses are stored. Entries are keyed by the full
//! request URL, query string included, and expire `ttl` seconds after they
//! were written.

use super::ApiResponse;
use crate::error::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

pub struct ResponseCache {
    conn: Connection,
    ttl: i64,
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache").field("ttl", &self.ttl).finish()
    }
}

impl ResponseCache {
    pub fn open(path: &Path, ttl: u64) -> Result<Self> {
        Self::init(Connection::open(path)?, ttl)
    }

    pub fn in_memory(ttl: u64) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, ttl)
    }

    fn init(conn: Connection, ttl: u64) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS responses (
                url TEXT PRIMARY KEY,
                status INTEGER NOT NULL,
                body BLOB NOT NULL,
                stored_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(ResponseCache {
            conn,
            ttl: i64::try_from(ttl).unwrap_or(i64::MAX),
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<ApiResponse>> {
        self.get_at(key, Utc::now().timestamp())
    }

    fn get_at(&self, key: &str, now: i64) -> Result<Option<ApiResponse>> {
        let row = self
            .conn
            .query_row(
                "SELECT status, body, stored_at FROM responses WHERE url = ?1",
                params![key],
                |row| {
                    Ok((
                        row.get::<_, u16>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(match row {
            Some((status, body, stored_at)) if now.saturating_sub(stored_at) < self.ttl => {
                Some(ApiResponse {
                    status,
                    url: key.to_string(),
                    body,
                })
            }
            _ => None,
        })
    }

    pub fn put(&self, key: &str, response: &ApiResponse) -> Result<()> {
        self.put_at(key, response, Utc::now().timestamp())
    }

    fn put_at(&self, key: &str, response: &ApiResponse, now: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO responses (url, status, body, stored_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, response.status, response.body, now],
        )?;
        Ok(())
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> Result<usize> {
        let cutoff = Utc::now().timestamp().saturating_sub(self.ttl);
        Ok(self
            .conn
            .execute("DELETE FROM responses WHERE stored_at <= ?1", params![cutoff])?)
    }
}
