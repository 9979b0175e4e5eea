//! Declarative schema and static-data synchronization for MySQL and SQLite.
//!
//! `dbsync` reconciles a declarative schema document (tables, fields,
//! indexes, foreign keys) and a static-data document (canonical reference
//! rows) against the live structure of a database:
//! - The effective schema is derived from the document plus satellite
//!   tables (index, control, version, files, notes) requested by the apps
//!   catalog
//! - Live metadata is introspected and diffed against it, and the minimal
//!   DDL is planned, rebuilding altered tables through a backup copy so no
//!   rows are lost
//! - Static rows are cleared and reinserted, fanning out comma-separated
//!   key fields into one row per value
//! - A content hash of the documents skips both passes when nothing
//!   changed, and a named file semaphore serializes concurrent processes
//!
//! # Architecture
//!
//! - **Spec** - Serde types for the two documents
//! - **Derive** - Expands the schema document into [`TableSpec`]s
//! - **Catalog** - Resolves the derived schema for one backend
//! - **Introspect** - Reads live tables, fields, indexes and engines
//! - **Planner** - Diffs the catalog against a live snapshot
//! - **Executor** - Runs plans, or collects their SQL in dry-run mode
//! - **Gate** - Hash gate, semaphore and pass orchestration
//!
//! # Example
//!
//! ```rust,ignore
//! use dbsync::prelude::*;
//!
//! let config = SyncConfig::new("sqlite:app.db")
//!     .schema_path("xml/dbschema.json")
//!     .static_path("xml/dbstatic.json");
//! let context = SyncContext::connect(config).await?;
//! let synchronizer = Synchronizer::from_config(context)?;
//!
//! for report in synchronizer.bootstrap().await? {
//!     println!("{report}");
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Run the schema pass, then the static pass
//! dbsync --database sqlite:app.db sync
//!
//! # Print the SQL the schema pass would run
//! dbsync --database sqlite:app.db plan schema
//!
//! # Show whether the stored hashes are current
//! dbsync --database sqlite:app.db check
//!
//! # Show the derived schema, satellites and generated indexes included
//! dbsync --database sqlite:app.db catalog
//! ```

pub mod backend;
pub mod catalog;
pub mod config;
pub mod db;
pub mod derive;
pub mod dialect;
pub mod dialected;
pub mod error;
pub mod executor;
pub mod gate;
pub mod hash;
pub mod introspect;
pub mod live;
pub mod lock;
pub mod operations;
pub mod planner;
pub mod report;
pub mod schema;
pub mod spec;
pub mod state;
pub mod static_data;
pub mod types;

pub use schema::{FieldSpec, IndexSpec, TableSpec};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::backend::Backend;
    pub use crate::catalog::{CatalogField, CatalogIndex, CatalogTable, SchemaCatalog};
    pub use crate::config::SyncConfig;
    pub use crate::db::{Database, SqlValue};
    pub use crate::derive::{AppsCatalog, DeriveOptions, DerivedSchema, SatelliteKind, SchemaDeriver};
    pub use crate::dialect::{dialect_for, MySqlDialect, SqlDialect, SqliteDialect};
    pub use crate::dialected::{Dialected, Fragment};
    pub use crate::error::{Result, SyncError};
    pub use crate::executor::Executor;
    pub use crate::gate::{SyncContext, Synchronizer};
    pub use crate::introspect::{Capabilities, Introspector, SearchStrategy};
    pub use crate::live::{LiveField, LiveSchema, LiveTable};
    pub use crate::lock::{Semaphore, SemaphoreGuard};
    pub use crate::operations::{ColumnDef, CopySource, SyncOperation};
    pub use crate::planner::{Plan, PlanStep, Planner};
    pub use crate::report::{SyncKind, SyncReport};
    pub use crate::schema::{FieldSpec, IndexSpec, TableSpec};
    pub use crate::spec::{SchemaDocument, StaticDocument, StaticRow};
    pub use crate::state::SyncStateStore;
    pub use crate::static_data::StaticSynchronizer;
}
