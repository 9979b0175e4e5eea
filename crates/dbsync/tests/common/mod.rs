#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use dbsync::prelude::*;

pub async fn memory_db() -> Database {
    Database::connect("sqlite::memory:", 1)
        .await
        .unwrap_or_else(|e| panic!("Failed to open in-memory database: {e}"))
}

/// Builds a synchronizer over `db` for the given documents.
pub async fn synchronizer(db: &Database, lock_dir: &Path, schema: &str, data: &str) -> Synchronizer {
    let config = SyncConfig::new("sqlite::memory:")
        .lock_dir(lock_dir)
        .lock_timeout(Duration::from_millis(200));
    let context = SyncContext::with_database(db.clone(), config)
        .await
        .unwrap_or_else(|e| panic!("Failed to build context: {e}"));
    let schema = SchemaDocument::from_json(schema)
        .unwrap_or_else(|e| panic!("Invalid schema document: {e}\n{schema}"));
    let data = StaticDocument::from_json(data)
        .unwrap_or_else(|e| panic!("Invalid static document: {e}\n{data}"));
    Synchronizer::new(context, schema, data).unwrap_or_else(|e| panic!("Failed to derive: {e}"))
}

/// Runs the schema pass for `schema` with no static data.
pub async fn sync_schema(db: &Database, lock_dir: &Path, schema: &str) -> SyncReport {
    synchronizer(db, lock_dir, schema, "{}")
        .await
        .sync(SyncKind::Schema)
        .await
        .unwrap_or_else(|e| panic!("Schema pass failed: {e}"))
}

pub async fn count(db: &Database, table: &str) -> i64 {
    db.fetch_count(&format!("SELECT COUNT(*) FROM \"{table}\""))
        .await
        .unwrap_or_else(|e| panic!("Failed to count {table}: {e}"))
}

pub async fn tables(db: &Database) -> Vec<String> {
    Introspector::new(db.clone()).list_tables().await.unwrap()
}

/// Schema document with one `tbl_demo` table.
pub fn demo_schema(name_type: &str, indexes: &str) -> String {
    format!(
        r#"{{"tables":[{{"name":"tbl_demo","fields":[
            {{"name":"id","type":"/*MYSQL INT(11) *//*SQLITE INTEGER */","pkey":"true"}},
            {{"name":"name","type":"{name_type}"}},
            {{"name":"code","type":"VARCHAR(20)"}}],
            "indexes":[{indexes}]}}]}}"#
    )
}
