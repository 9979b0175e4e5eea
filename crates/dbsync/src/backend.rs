//! Supported database backends.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// The database engines the synchronizer knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// MySQL or MariaDB.
    MySql,
    /// SQLite 3.
    Sqlite,
}

impl Backend {
    /// All backends, in marker order.
    pub const ALL: [Self; 2] = [Self::MySql, Self::Sqlite];

    /// Parses a driver name as found in legacy configuration files.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" | "mysqli" | "pdo_mysql" => Ok(Self::MySql),
            "sqlite" | "sqlite3" | "pdo_sqlite" => Ok(Self::Sqlite),
            _ => Err(SyncError::UnknownBackend(name.to_string())),
        }
    }

    /// Infers the backend from a connection URL scheme.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| SyncError::UnknownBackend(url.to_string()))?;
        Self::from_name(scheme)
    }

    /// Marker tag used in backend-conditional comments (`/*MYSQL ... */`).
    #[must_use]
    pub fn marker(&self) -> &'static str {
        match self {
            Self::MySql => "MYSQL",
            Self::Sqlite => "SQLITE",
        }
    }

    /// Lowercase backend name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
