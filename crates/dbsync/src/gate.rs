//! Pass orchestration behind the hash gate.
//!
//! Each pass hashes its documents and compares the result with the hash
//! stored by the last successful run. Equal hashes return immediately
//! without taking the semaphore or touching the schema. Otherwise the
//! semaphore is acquired, the hash is checked again (another process may
//! have finished the same work while we waited), the pass runs and the new
//! hash is stored.

use tracing::info;

use crate::backend::Backend;
use crate::catalog::SchemaCatalog;
use crate::config::SyncConfig;
use crate::db::Database;
use crate::derive::{AppsCatalog, SchemaDeriver};
use crate::error::Result;
use crate::executor::Executor;
use crate::hash::content_hash;
use crate::introspect::{Capabilities, Introspector};
use crate::lock::Semaphore;
use crate::planner::Planner;
use crate::report::{SyncKind, SyncReport};
use crate::spec::{SchemaDocument, StaticDocument};
use crate::state::SyncStateStore;
use crate::static_data::StaticSynchronizer;

/// Connection, detected capabilities and settings shared by every pass.
#[derive(Debug, Clone)]
pub struct SyncContext {
    db: Database,
    capabilities: Capabilities,
    config: SyncConfig,
}

impl SyncContext {
    /// Connects to the configured database and detects its capabilities.
    pub async fn connect(config: SyncConfig) -> Result<Self> {
        let db = Database::connect(&config.database_url, config.max_connections).await?;
        Self::with_database(db, config).await
    }

    /// Wraps an existing connection.
    pub async fn with_database(db: Database, config: SyncConfig) -> Result<Self> {
        let capabilities = Introspector::new(db.clone()).capabilities().await?;
        Ok(Self {
            db,
            capabilities,
            config,
        })
    }

    /// The database connection.
    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// The database backend.
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.db.backend()
    }

    /// Detected capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Settings.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// A fresh introspector over the connection.
    #[must_use]
    pub fn introspector(&self) -> Introspector {
        Introspector::new(self.db.clone())
    }
}

/// Runs the schema and static passes for one pair of documents.
#[derive(Debug)]
pub struct Synchronizer {
    context: SyncContext,
    schema: SchemaDocument,
    data: StaticDocument,
    catalog: SchemaCatalog,
    state: SyncStateStore,
    semaphore: Semaphore,
}

impl Synchronizer {
    /// Creates a synchronizer over already loaded documents.
    pub fn new(context: SyncContext, schema: SchemaDocument, data: StaticDocument) -> Result<Self> {
        let config = context.config();
        let state = SyncStateStore::new(context.db().clone(), config.state_table.clone());
        let semaphore = Semaphore::new(&config.lock_dir, config.lock_name.clone())
            .timeout(config.lock_timeout);

        let hash = content_hash(&(&schema, &data))?;
        let apps = AppsCatalog::from_static(&data, &config.derive.apps_table);
        let derived = SchemaDeriver::new(&config.derive, &apps).derive(schema.clone())?;
        let catalog = SchemaCatalog::build(&derived, context.backend(), hash)?;

        Ok(Self {
            context,
            schema,
            data,
            catalog,
            state,
            semaphore,
        })
    }

    /// Creates a synchronizer over the documents named in the configuration.
    pub fn from_config(context: SyncContext) -> Result<Self> {
        let (schema, data) = context.config().load_documents()?;
        Self::new(context, schema, data)
    }

    /// The shared context.
    #[must_use]
    pub fn context(&self) -> &SyncContext {
        &self.context
    }

    /// The resolved schema the schema pass converges to.
    #[must_use]
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Hash of the documents a pass depends on.
    ///
    /// Satellite tables come from the apps catalog, so the schema hash
    /// covers both documents.
    pub fn spec_hash(&self, kind: SyncKind) -> Result<String> {
        match kind {
            SyncKind::Schema => content_hash(&(&self.schema, &self.data)),
            SyncKind::Static => content_hash(&self.data),
        }
    }

    async fn stored_hash(&self, kind: SyncKind) -> Result<Option<String>> {
        let tables = self.context.introspector().list_tables().await?;
        if !tables.iter().any(|t| t == self.state.table()) {
            return Ok(None);
        }
        self.state.get(kind).await
    }

    /// Returns true if the stored hash for `kind` matches the documents.
    pub async fn check(&self, kind: SyncKind) -> Result<bool> {
        let hash = self.spec_hash(kind)?;
        Ok(self.stored_hash(kind).await?.as_deref() == Some(hash.as_str()))
    }

    /// Runs `kind` if its documents changed since the last run.
    pub async fn sync(&self, kind: SyncKind) -> Result<SyncReport> {
        let hash = self.spec_hash(kind)?;
        if self.stored_hash(kind).await?.as_deref() == Some(hash.as_str()) {
            info!(pass = %kind, "Up to date");
            return Ok(SyncReport::unchanged(kind));
        }

        let _guard = self.semaphore.acquire().await?;
        if self.stored_hash(kind).await?.as_deref() == Some(hash.as_str()) {
            info!(pass = %kind, "Synchronized by another process");
            return Ok(SyncReport::unchanged(kind));
        }

        info!(pass = %kind, "Synchronizing");
        let report = self.run_pass(kind, false).await?;
        self.state.ensure_table().await?;
        self.state.set(kind, &hash).await?;
        info!(pass = %kind, changes = report.count(), "Synchronized");
        Ok(report)
    }

    /// Plans `kind` without executing or storing anything.
    pub async fn plan(&self, kind: SyncKind) -> Result<SyncReport> {
        self.run_pass(kind, true).await
    }

    /// Runs the schema pass, then the static pass.
    pub async fn bootstrap(&self) -> Result<Vec<SyncReport>> {
        let schema = self.sync(SyncKind::Schema).await?;
        let data = self.sync(SyncKind::Static).await?;
        Ok(vec![schema, data])
    }

    async fn run_pass(&self, kind: SyncKind, dry_run: bool) -> Result<SyncReport> {
        match kind {
            SyncKind::Schema => self.run_schema(dry_run).await,
            SyncKind::Static => {
                StaticSynchronizer::new(self.context.db().clone())
                    .run(&self.data, dry_run)
                    .await
            }
        }
    }

    async fn run_schema(&self, dry_run: bool) -> Result<SyncReport> {
        let live = self.context.introspector().snapshot().await?;
        let plan = Planner::new(&self.catalog, self.context.capabilities())
            .reserve(self.state.table())
            .plan(&live)?;

        let mut report = SyncReport::new(SyncKind::Schema);
        Executor::new(self.context.db().clone())
            .dry_run(dry_run)
            .execute(&plan, &mut report)
            .await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"{"tables":[
        {"name":"tbl_users","fields":[
            {"name":"id","type":"INTEGER","pkey":"true"},
            {"name":"login","type":"VARCHAR(50)"}]},
        {"name":"tbl_apps","fields":[
            {"name":"id","type":"INTEGER","pkey":"true"},
            {"name":"code","type":"VARCHAR(50)"},
            {"name":"table","type":"VARCHAR(50)"}]}
    ]}"#;

    const DATA: &str = r#"{"tables":[
        {"name":"tbl_apps","rows":[{"id":"1","code":"users","table":"tbl_users"}]}
    ]}"#;

    async fn setup(dir: &std::path::Path) -> Synchronizer {
        let db = Database::connect("sqlite::memory:", 1).await.unwrap();
        let config = SyncConfig::new("sqlite::memory:").lock_dir(dir);
        let context = SyncContext::with_database(db, config).await.unwrap();
        Synchronizer::new(
            context,
            SchemaDocument::from_json(SCHEMA).unwrap(),
            StaticDocument::from_json(DATA).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_hashes_differ_per_pass() {
        let dir = tempfile::tempdir().unwrap();
        let sync = setup(dir.path()).await;
        let schema = sync.spec_hash(SyncKind::Schema).unwrap();
        let data = sync.spec_hash(SyncKind::Static).unwrap();
        assert_ne!(schema, data);
        assert!(sync.catalog().is_current(&schema));
    }

    #[tokio::test]
    async fn test_sync_then_skip() {
        let dir = tempfile::tempdir().unwrap();
        let sync = setup(dir.path()).await;
        assert!(!sync.check(SyncKind::Schema).await.unwrap());

        let report = sync.sync(SyncKind::Schema).await.unwrap();
        assert!(!report.skipped);
        assert_eq!(report.count(), 2);
        assert!(sync.check(SyncKind::Schema).await.unwrap());

        let report = sync.sync(SyncKind::Schema).await.unwrap();
        assert!(report.skipped);
        assert!(report.statements.is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_runs_both_passes() {
        let dir = tempfile::tempdir().unwrap();
        let sync = setup(dir.path()).await;
        let reports = sync.bootstrap().await.unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].history, ["tbl_apps: from 0 to 1"]);
        assert_eq!(reports[1].count(), 1);

        let count = sync
            .context()
            .db()
            .fetch_count("SELECT COUNT(*) FROM tbl_apps")
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(sync.check(SyncKind::Static).await.unwrap());
    }

    #[tokio::test]
    async fn test_plan_is_dry() {
        let dir = tempfile::tempdir().unwrap();
        let sync = setup(dir.path()).await;
        let report = sync.plan(SyncKind::Schema).await.unwrap();
        assert!(report.dry_run);
        assert!(!report.statements.is_empty());

        let tables = sync.context().introspector().list_tables().await.unwrap();
        assert!(tables.is_empty());
        assert!(!sync.check(SyncKind::Schema).await.unwrap());
    }

    #[tokio::test]
    async fn test_held_semaphore_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect("sqlite::memory:", 1).await.unwrap();
        let config = SyncConfig::new("sqlite::memory:")
            .lock_dir(dir.path())
            .lock_timeout(std::time::Duration::from_millis(50));
        let context = SyncContext::with_database(db, config).await.unwrap();
        let sync = Synchronizer::new(
            context,
            SchemaDocument::from_json(SCHEMA).unwrap(),
            StaticDocument::default(),
        )
        .unwrap();

        let _held = Semaphore::new(dir.path(), "db_schema").acquire().await.unwrap();
        let err = sync.sync(SyncKind::Schema).await.unwrap_err();
        assert!(matches!(err, crate::error::SyncError::LockTimeout { .. }));
    }
}
