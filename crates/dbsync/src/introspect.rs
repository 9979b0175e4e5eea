//! Live metadata introspection.
//!
//! Reads the current table list, column list and index list from the
//! connected database. Missing tables produce empty results rather than
//! errors, so the planner can look up backup tables freely.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::backend::Backend;
use crate::db::Database;
use crate::dialect::{MySqlDialect, SqliteDialect};
use crate::error::Result;
use crate::live::{LiveField, LiveSchema, LiveTable};

/// Engines that can host a fulltext index.
const FULLTEXT_ENGINES: [&str; 4] = ["mroonga", "innodb", "myisam", "aria"];

/// How searches over satellite index tables should be performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchStrategy {
    /// `MATCH ... AGAINST` over a fulltext index.
    Fulltext,
    /// `LIKE '%...%'` over a plain index.
    Substring,
}

/// What the connected database can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Active backend.
    pub backend: Backend,
    /// Lowercase names of the usable storage engines.
    pub engines: BTreeSet<String>,
    /// Whether fulltext indexes can be created.
    pub fulltext: bool,
}

impl Capabilities {
    /// Derives capabilities from the engine list.
    #[must_use]
    pub fn new(backend: Backend, engines: BTreeSet<String>) -> Self {
        let fulltext = backend == Backend::MySql
            && FULLTEXT_ENGINES.iter().any(|engine| engines.contains(*engine));
        Self {
            backend,
            engines,
            fulltext,
        }
    }

    /// Returns true if the storage engine is available.
    #[must_use]
    pub fn has_engine(&self, engine: &str) -> bool {
        self.engines.contains(&engine.to_ascii_lowercase())
    }

    /// Search strategy for fulltext tables.
    #[must_use]
    pub fn search_strategy(&self) -> SearchStrategy {
        if self.fulltext {
            SearchStrategy::Fulltext
        } else {
            SearchStrategy::Substring
        }
    }

    /// Storage engine for a new table; `None` when the backend has no engines.
    #[must_use]
    pub fn engine_for(&self, fulltext: bool) -> Option<String> {
        if self.backend != Backend::MySql {
            return None;
        }
        let engine = if fulltext && self.has_engine("mroonga") {
            "Mroonga"
        } else if self.has_engine("aria") {
            "Aria"
        } else {
            "MyISAM"
        };
        Some(engine.to_string())
    }
}

/// Reads live metadata from a database.
#[derive(Debug, Clone)]
pub struct Introspector {
    db: Database,
}

impl Introspector {
    /// Creates a new introspector.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Base tables, excluding backend internals.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let sql = match self.db.backend() {
            Backend::MySql => MySqlDialect::LIST_TABLES_SQL,
            Backend::Sqlite => SqliteDialect::LIST_TABLES_SQL,
        };
        self.db.fetch_column(sql, &[]).await
    }

    /// Columns of `table` with uppercase types, in order.
    pub async fn list_fields(&self, table: &str) -> Result<Vec<LiveField>> {
        let sql = match self.db.backend() {
            Backend::MySql => MySqlDialect::LIST_FIELDS_SQL,
            Backend::Sqlite => SqliteDialect::LIST_FIELDS_SQL,
        };
        let rows = self.db.fetch_pairs(sql, &[table]).await?;
        Ok(rows
            .into_iter()
            .map(|(name, sql_type)| LiveField::new(name, &sql_type))
            .collect())
    }

    /// Indexes of `table` as name to ordered fields, primary key excluded.
    pub async fn list_indexes(&self, table: &str) -> Result<BTreeMap<String, Vec<String>>> {
        let mut indexes: BTreeMap<String, Vec<String>> = BTreeMap::new();
        match self.db.backend() {
            Backend::MySql => {
                let rows = self
                    .db
                    .fetch_pairs(MySqlDialect::LIST_INDEXES_SQL, &[table])
                    .await?;
                for (index, field) in rows {
                    indexes.entry(index).or_default().push(field);
                }
            }
            Backend::Sqlite => {
                let names = self
                    .db
                    .fetch_column(SqliteDialect::LIST_INDEXES_SQL, &[table])
                    .await?;
                for name in names {
                    let fields = self
                        .db
                        .fetch_column(SqliteDialect::LIST_INDEX_FIELDS_SQL, &[name.as_str()])
                        .await?;
                    indexes.insert(name, fields);
                }
            }
        }
        Ok(indexes)
    }

    /// Lowercase names of the usable storage engines; empty on SQLite.
    pub async fn engines(&self) -> Result<BTreeSet<String>> {
        match self.db.backend() {
            Backend::MySql => {
                let engines = self
                    .db
                    .fetch_column(MySqlDialect::LIST_ENGINES_SQL, &[])
                    .await?;
                Ok(engines.into_iter().map(|e| e.to_ascii_lowercase()).collect())
            }
            Backend::Sqlite => Ok(BTreeSet::new()),
        }
    }

    /// Detects the capabilities of the database.
    pub async fn capabilities(&self) -> Result<Capabilities> {
        let engines = self.engines().await?;
        let capabilities = Capabilities::new(self.db.backend(), engines);
        debug!(
            backend = %capabilities.backend,
            fulltext = capabilities.fulltext,
            "Detected capabilities"
        );
        Ok(capabilities)
    }

    /// Reads every table with its fields and indexes.
    pub async fn snapshot(&self) -> Result<LiveSchema> {
        let mut live = LiveSchema::new();
        for name in self.list_tables().await? {
            let table = LiveTable {
                fields: self.list_fields(&name).await?,
                indexes: self.list_indexes(&name).await?,
            };
            live.insert(name, table);
        }
        Ok(live)
    }
}
