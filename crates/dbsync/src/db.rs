//! Database connection handle.
//!
//! Wraps one sqlx pool per supported backend behind a single enum so the
//! rest of the crate can issue statements without caring which engine is
//! on the other end. Both backends use `?` placeholders.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, FromRow};
use tracing::debug;

use crate::backend::Backend;
use crate::error::Result;

/// A value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "'{}'", v.replace('\'', "''")),
        }
    }
}

/// Runs `$body` with `$pool` bound to whichever pool `$db` holds and `$kind`
/// aliased to the matching sqlx database type.
macro_rules! with_pool {
    ($db:expr, $pool:ident, $kind:ident => $body:expr) => {
        match $db {
            Database::Sqlite($pool) => {
                type $kind = sqlx::Sqlite;
                $body
            }
            Database::MySql($pool) => {
                type $kind = sqlx::MySql;
                $body
            }
        }
    };
}

/// A connection pool for one of the supported backends.
#[derive(Debug, Clone)]
pub enum Database {
    /// SQLite pool.
    Sqlite(SqlitePool),
    /// MySQL or MariaDB pool.
    MySql(MySqlPool),
}

impl Database {
    /// Connects to `url`, picking the backend from the URL scheme.
    ///
    /// SQLite connections run with foreign key enforcement off and
    /// `legacy_alter_table` on, so renaming a table never rewrites the
    /// references other tables hold to it.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        match Backend::from_url(url)? {
            Backend::Sqlite => {
                let options = SqliteConnectOptions::from_str(url)?
                    .foreign_keys(false)
                    .create_if_missing(true);
                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .after_connect(|conn, _meta| {
                        Box::pin(async move {
                            conn.execute("PRAGMA legacy_alter_table = ON").await?;
                            Ok(())
                        })
                    })
                    .connect_with(options)
                    .await?;
                Ok(Self::Sqlite(pool))
            }
            Backend::MySql => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(max_connections)
                    .connect(url)
                    .await?;
                Ok(Self::MySql(pool))
            }
        }
    }

    /// Returns the backend behind this pool.
    #[must_use]
    pub fn backend(&self) -> Backend {
        match self {
            Self::Sqlite(_) => Backend::Sqlite,
            Self::MySql(_) => Backend::MySql,
        }
    }

    /// Executes a statement without parameters, returning affected rows.
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        debug!(sql = %sql, "Executing SQL");
        let affected = with_pool!(self, pool, Db => {
            sqlx::query::<Db>(sql).execute(pool).await?.rows_affected()
        });
        Ok(affected)
    }

    /// Executes a statement binding `values` to its placeholders in order.
    pub async fn execute_with(&self, sql: &str, values: &[SqlValue]) -> Result<u64> {
        debug!(sql = %sql, values = values.len(), "Executing SQL");
        let affected = with_pool!(self, pool, Db => {
            let mut query = sqlx::query::<Db>(sql);
            for value in values {
                query = match value {
                    SqlValue::Int(v) => query.bind(*v),
                    SqlValue::Float(v) => query.bind(*v),
                    SqlValue::Text(v) => query.bind(v.clone()),
                };
            }
            query.execute(pool).await?.rows_affected()
        });
        Ok(affected)
    }

    /// Fetches every row of a query as `T`, binding `binds` as text.
    pub async fn fetch_all<T>(&self, sql: &str, binds: &[&str]) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        let rows = with_pool!(self, pool, Db => {
            let mut query = sqlx::query_as::<Db, T>(sql);
            for bind in binds {
                query = query.bind(bind.to_string());
            }
            query.fetch_all(pool).await?
        });
        Ok(rows)
    }

    /// Fetches a single text column.
    pub async fn fetch_column(&self, sql: &str, binds: &[&str]) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = self.fetch_all(sql, binds).await?;
        Ok(rows.into_iter().map(|(value,)| value).collect())
    }

    /// Fetches two text columns.
    pub async fn fetch_pairs(&self, sql: &str, binds: &[&str]) -> Result<Vec<(String, String)>> {
        self.fetch_all(sql, binds).await
    }

    /// Fetches an optional single text value.
    pub async fn fetch_optional(&self, sql: &str, binds: &[&str]) -> Result<Option<String>> {
        let row: Option<(String,)> = with_pool!(self, pool, Db => {
            let mut query = sqlx::query_as::<Db, (String,)>(sql);
            for bind in binds {
                query = query.bind(bind.to_string());
            }
            query.fetch_optional(pool).await?
        });
        Ok(row.map(|(value,)| value))
    }

    /// Fetches a single integer, typically a `COUNT(*)`.
    pub async fn fetch_count(&self, sql: &str) -> Result<i64> {
        let (count,): (i64,) = with_pool!(self, pool, Db => {
            sqlx::query_as::<Db, (i64,)>(sql).fetch_one(pool).await?
        });
        Ok(count)
    }

    /// Closes the pool.
    pub async fn close(&self) {
        match self {
            Self::Sqlite(pool) => pool.close().await,
            Self::MySql(pool) => pool.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_memory_sqlite() {
        let db = Database::connect("sqlite::memory:", 1).await.unwrap();
        assert_eq!(db.backend(), Backend::Sqlite);

        db.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, score REAL)")
            .await
            .unwrap();
        let affected = db
            .execute_with(
                "INSERT INTO t (id, name, score) VALUES (?, ?, ?)",
                &[
                    SqlValue::Int(1),
                    SqlValue::Text("a".to_string()),
                    SqlValue::Float(1.5),
                ],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let names = db.fetch_column("SELECT name FROM t WHERE id = ?", &["1"]).await.unwrap();
        assert_eq!(names, ["a"]);
        assert_eq!(db.fetch_count("SELECT COUNT(*) FROM t").await.unwrap(), 1);
        assert_eq!(
            db.fetch_optional("SELECT name FROM t WHERE id = ?", &["2"]).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_legacy_alter_table_enabled() {
        let db = Database::connect("sqlite::memory:", 1).await.unwrap();
        let (value,): (i64,) = match &db {
            Database::Sqlite(pool) => sqlx::query_as("PRAGMA legacy_alter_table")
                .fetch_one(pool)
                .await
                .unwrap(),
            Database::MySql(_) => unreachable!(),
        };
        assert_eq!(value, 1);
    }

    #[test]
    fn test_display_values() {
        assert_eq!(SqlValue::Int(3).to_string(), "3");
        assert_eq!(SqlValue::Text("it's".to_string()).to_string(), "'it''s'");
    }
}
