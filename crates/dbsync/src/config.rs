//! Synchronizer settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::derive::DeriveOptions;
use crate::error::Result;
use crate::lock::{DEFAULT_LOCK_NAME, DEFAULT_LOCK_TIMEOUT};
use crate::spec::{SchemaDocument, StaticDocument};
use crate::state::DEFAULT_STATE_TABLE;

/// Default location of the schema document.
pub const DEFAULT_SCHEMA_PATH: &str = "xml/dbschema.json";

/// Default location of the static-data document.
pub const DEFAULT_STATIC_PATH: &str = "xml/dbstatic.json";

/// Everything a [`Synchronizer`](crate::gate::Synchronizer) needs to run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Database URL (`sqlite:...` or `mysql://...`).
    pub database_url: String,
    /// Schema document path.
    pub schema_path: PathBuf,
    /// Static-data document path.
    pub static_path: PathBuf,
    /// Directory holding semaphore files.
    pub lock_dir: PathBuf,
    /// Semaphore name.
    pub lock_name: String,
    /// How long to wait for the semaphore.
    pub lock_timeout: Duration,
    /// Table holding the stored pass hashes.
    pub state_table: String,
    /// Pool size.
    pub max_connections: u32,
    /// Table names used during derivation.
    pub derive: DeriveOptions,
}

impl SyncConfig {
    /// Creates a configuration with defaults for everything but the URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            schema_path: PathBuf::from(DEFAULT_SCHEMA_PATH),
            static_path: PathBuf::from(DEFAULT_STATIC_PATH),
            lock_dir: std::env::temp_dir().join("dbsync"),
            lock_name: DEFAULT_LOCK_NAME.to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            state_table: DEFAULT_STATE_TABLE.to_string(),
            max_connections: 5,
            derive: DeriveOptions::default(),
        }
    }

    /// Sets the schema document path.
    #[must_use]
    pub fn schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = path.into();
        self
    }

    /// Sets the static-data document path.
    #[must_use]
    pub fn static_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.static_path = path.into();
        self
    }

    /// Sets the semaphore directory.
    #[must_use]
    pub fn lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = dir.into();
        self
    }

    /// Sets the semaphore name.
    #[must_use]
    pub fn lock_name(mut self, name: impl Into<String>) -> Self {
        self.lock_name = name.into();
        self
    }

    /// Sets the semaphore timeout.
    #[must_use]
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the state table name.
    #[must_use]
    pub fn state_table(mut self, table: impl Into<String>) -> Self {
        self.state_table = table.into();
        self
    }

    /// Sets the pool size.
    #[must_use]
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the derivation options.
    #[must_use]
    pub fn derive_options(mut self, options: DeriveOptions) -> Self {
        self.derive = options;
        self
    }

    /// Loads both documents from their configured paths.
    pub fn load_documents(&self) -> Result<(SchemaDocument, StaticDocument)> {
        let schema = SchemaDocument::load(&self.schema_path)?;
        let data = load_optional_static(&self.static_path)?;
        Ok((schema, data))
    }
}

/// A missing static document means there is no static data.
fn load_optional_static(path: &Path) -> Result<StaticDocument> {
    if path.exists() {
        StaticDocument::load(path)
    } else {
        Ok(StaticDocument::default())
    }
}
