//! Stored pass hashes.
//!
//! This module manages the state table that records, per pass, the hash of
//! the documents the database was last synchronized against.

use chrono::{DateTime, Utc};

use crate::db::{Database, SqlValue};
use crate::dialect::dialect_for;
use crate::error::{Result, SyncError};
use crate::report::SyncKind;

/// Default name of the state table.
pub const DEFAULT_STATE_TABLE: &str = "dbsync_state";

/// A stored hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHash {
    /// Pass key (`dbschema` or `dbstatic`).
    pub name: String,
    /// Hash of the documents.
    pub hash: String,
    /// When the hash was written.
    pub updated_at: DateTime<Utc>,
}

/// Parses RFC 3339, or the `DATETIME` text format both backends return.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .ok()
}

/// Reads and writes pass hashes.
#[derive(Debug, Clone)]
pub struct SyncStateStore {
    db: Database,
    table: String,
}

impl SyncStateStore {
    /// Creates a store over `table`.
    pub fn new(db: Database, table: impl Into<String>) -> Self {
        Self {
            db,
            table: table.into(),
        }
    }

    /// Name of the state table.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    fn quoted(&self) -> String {
        dialect_for(self.db.backend()).quote_identifier(&self.table)
    }

    /// Ensures the state table exists.
    pub async fn ensure_table(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             name VARCHAR(255) NOT NULL PRIMARY KEY, \
             hash VARCHAR(255) NOT NULL, \
             updated_at VARCHAR(64) NOT NULL)",
            self.quoted()
        );
        self.db.execute(&sql).await?;
        Ok(())
    }

    /// Returns the stored hash for `kind`, if any.
    pub async fn get(&self, kind: SyncKind) -> Result<Option<String>> {
        let sql = format!("SELECT hash FROM {} WHERE name = ?", self.quoted());
        self.db.fetch_optional(&sql, &[kind.state_key()]).await
    }

    /// Returns every stored hash.
    pub async fn all(&self) -> Result<Vec<StoredHash>> {
        let sql = format!(
            "SELECT name, hash, updated_at FROM {} ORDER BY name",
            self.quoted()
        );
        let rows: Vec<(String, String, String)> = self.db.fetch_all(&sql, &[]).await?;

        let mut stored = Vec::new();
        for (name, hash, updated_at) in rows {
            let Some(updated_at) = parse_timestamp(&updated_at) else {
                return Err(SyncError::InvalidTimestamp {
                    name,
                    value: updated_at,
                });
            };
            stored.push(StoredHash {
                name,
                hash,
                updated_at,
            });
        }
        Ok(stored)
    }

    /// Records `hash` for `kind`, replacing any previous value.
    pub async fn set(&self, kind: SyncKind, hash: &str) -> Result<()> {
        let sql = format!(
            "REPLACE INTO {} (name, hash, updated_at) VALUES (?, ?, ?)",
            self.quoted()
        );
        self.db
            .execute_with(
                &sql,
                &[
                    SqlValue::Text(kind.state_key().to_string()),
                    SqlValue::Text(hash.to_string()),
                    SqlValue::Text(Utc::now().to_rfc3339()),
                ],
            )
            .await?;
        Ok(())
    }
}
