//! Integration tests for the schema and static passes.
//!
//! Every test runs the full gate (hash, semaphore, plan, execute, store)
//! against an in-memory SQLite database.

mod common;

use common::{count, demo_schema, memory_db, sync_schema, synchronizer, tables};
use dbsync::prelude::*;

const INDEXED: &str = r#"{"name":"ix_demo","fields":"name"}"#;

// =============================================================================
// Idempotence and convergence
// =============================================================================

#[tokio::test]
async fn second_run_is_skipped_by_hash() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    let schema = demo_schema("VARCHAR(50)", INDEXED);

    let first = sync_schema(&db, dir.path(), &schema).await;
    assert_eq!(first.history, ["Create tbl_demo", "Create ix_demo on tbl_demo"]);

    let second = sync_schema(&db, dir.path(), &schema).await;
    assert!(second.skipped);
    assert!(second.statements.is_empty());
}

#[tokio::test]
async fn converged_database_plans_nothing() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    let schema = demo_schema("VARCHAR(50)", INDEXED);
    sync_schema(&db, dir.path(), &schema).await;

    // Bypass the hash gate and diff against the live database again.
    let sync = synchronizer(&db, dir.path(), &schema, "{}").await;
    let report = sync.plan(SyncKind::Schema).await.unwrap();
    assert!(report.is_noop(), "unexpected steps: {:?}", report.history);
    assert!(report.statements.is_empty());

    let live = Introspector::new(db.clone()).snapshot().await.unwrap();
    let table = live.get_table("tbl_demo").unwrap();
    let fields: Vec<(&str, &str)> = table
        .fields
        .iter()
        .map(|f| (f.name.as_str(), f.sql_type.as_str()))
        .collect();
    assert_eq!(fields, [("id", "INTEGER"), ("name", "VARCHAR(50)"), ("code", "VARCHAR(20)")]);
    assert_eq!(table.indexes.len(), 1);
    assert_eq!(table.indexes["ix_demo"], ["name"]);
}

#[tokio::test]
async fn state_table_is_never_treated_as_orphan() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    sync_schema(&db, dir.path(), &demo_schema("VARCHAR(50)", "")).await;
    sync_schema(&db, dir.path(), &demo_schema("VARCHAR(60)", "")).await;

    let names = tables(&db).await;
    assert!(names.contains(&"dbsync_state".to_string()));
    assert!(!names.contains(&"__dbsync_state__".to_string()));
}

// =============================================================================
// Data-preserving alteration
// =============================================================================

#[tokio::test]
async fn widening_a_column_preserves_rows() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    sync_schema(&db, dir.path(), &demo_schema("VARCHAR(50)", INDEXED)).await;

    for name in ["alpha", "beta", "gamma"] {
        db.execute(&format!("INSERT INTO tbl_demo (name, code) VALUES ('{name}', 'c')"))
            .await
            .unwrap();
    }

    let report = sync_schema(&db, dir.path(), &demo_schema("VARCHAR(100)", INDEXED)).await;
    assert_eq!(report.history, ["Alter tbl_demo", "Create ix_demo on tbl_demo"]);

    assert_eq!(count(&db, "tbl_demo").await, 3);
    assert!(!tables(&db).await.contains(&"__tbl_demo__".to_string()));

    let fields = Introspector::new(db.clone()).list_fields("tbl_demo").await.unwrap();
    assert_eq!(fields[1].sql_type, "VARCHAR(100)");

    let names = db
        .fetch_column("SELECT name FROM tbl_demo ORDER BY id", &[])
        .await
        .unwrap();
    assert_eq!(names, ["alpha", "beta", "gamma"]);
}

#[tokio::test]
async fn tbl_demo_varchar_scenario() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    let schema = |name_type: &str| {
        format!(
            r#"{{"tables":[{{"name":"tbl_demo","fields":[
                {{"name":"id","type":"INTEGER","pkey":"true"}},
                {{"name":"name","type":"{name_type}"}}]}}]}}"#
        )
    };

    let report = sync_schema(&db, dir.path(), &schema("VARCHAR(50)")).await;
    assert_eq!(report.history, ["Create tbl_demo"]);
    let live = Introspector::new(db.clone()).snapshot().await.unwrap();
    let table = live.get_table("tbl_demo").unwrap();
    assert_eq!(table.fields.len(), 2);
    assert!(table.indexes.is_empty());

    for name in ["a", "b", "c", "d"] {
        db.execute(&format!("INSERT INTO tbl_demo (name) VALUES ('{name}')"))
            .await
            .unwrap();
    }
    let before = count(&db, "tbl_demo").await;

    let report = sync_schema(&db, dir.path(), &schema("VARCHAR(100)")).await;
    let statements: Vec<&str> = report
        .statements
        .iter()
        .map(|s| s.split_whitespace().take(2).collect::<Vec<_>>())
        .map(|words| match words.as_slice() {
            ["ALTER", "TABLE"] => "rename",
            ["CREATE", "TABLE"] => "create",
            ["INSERT", "INTO"] => "copy",
            ["DROP", "TABLE"] => "drop",
            _ => "other",
        })
        .collect();
    assert_eq!(statements, ["rename", "create", "copy", "drop"]);
    assert!(report.statements[0].contains("\"__tbl_demo__\""));

    assert_eq!(count(&db, "tbl_demo").await, before);
    let fields = Introspector::new(db.clone()).list_fields("tbl_demo").await.unwrap();
    assert_eq!(fields[1].sql_type, "VARCHAR(100)");
}

#[tokio::test]
async fn added_column_is_filled_with_zero_value() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    sync_schema(&db, dir.path(), &demo_schema("VARCHAR(50)", "")).await;
    db.execute("INSERT INTO tbl_demo (name, code) VALUES ('alpha', 'a')")
        .await
        .unwrap();

    let schema = r#"{"tables":[{"name":"tbl_demo","fields":[
        {"name":"id","type":"INTEGER","pkey":"1"},
        {"name":"name","type":"VARCHAR(50)"},
        {"name":"code","type":"VARCHAR(20)"},
        {"name":"visits","type":"INT(11)"}]}]}"#;
    sync_schema(&db, dir.path(), schema).await;

    let visits = db
        .fetch_column("SELECT CAST(visits AS TEXT) FROM tbl_demo", &[])
        .await
        .unwrap();
    assert_eq!(visits, ["0"]);
}

// =============================================================================
// Orphans
// =============================================================================

#[tokio::test]
async fn dropped_table_is_kept_as_backup_and_restored() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    let with_old = r#"{"tables":[
        {"name":"tbl_demo","fields":[{"name":"id","type":"INTEGER","pkey":"1"}]},
        {"name":"tbl_old","fields":[
            {"name":"id","type":"INTEGER","pkey":"1"},
            {"name":"label","type":"VARCHAR(30)"}]}]}"#;
    let without_old = r#"{"tables":[
        {"name":"tbl_demo","fields":[{"name":"id","type":"INTEGER","pkey":"1"}]}]}"#;

    sync_schema(&db, dir.path(), with_old).await;
    db.execute("INSERT INTO tbl_old (label) VALUES ('kept')")
        .await
        .unwrap();

    let report = sync_schema(&db, dir.path(), without_old).await;
    assert_eq!(report.history, ["Rename tbl_old to __tbl_old__"]);
    let names = tables(&db).await;
    assert!(names.contains(&"__tbl_old__".to_string()));
    assert!(!names.contains(&"tbl_old".to_string()));

    let report = sync_schema(&db, dir.path(), with_old).await;
    assert_eq!(report.history, ["Rename __tbl_old__ to tbl_old"]);
    assert_eq!(count(&db, "tbl_old").await, 1);
    assert!(!tables(&db).await.contains(&"__tbl_old__".to_string()));
}

#[tokio::test]
async fn backup_with_other_shape_is_copied_back() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    db.execute("CREATE TABLE \"__tbl_demo__\" (id INTEGER PRIMARY KEY, name VARCHAR(10))")
        .await
        .unwrap();
    db.execute("INSERT INTO \"__tbl_demo__\" (id, name) VALUES (4, 'old')")
        .await
        .unwrap();

    let report = sync_schema(&db, dir.path(), &demo_schema("VARCHAR(50)", "")).await;
    assert_eq!(report.history, ["Alter tbl_demo from __tbl_demo__"]);
    let rows = db
        .fetch_pairs("SELECT CAST(id AS TEXT), code FROM tbl_demo", &[])
        .await
        .unwrap();
    assert_eq!(rows, [("4".to_string(), String::new())]);
    assert!(!tables(&db).await.contains(&"__tbl_demo__".to_string()));
}

#[tokio::test]
async fn backup_named_table_is_not_renamed_again() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    db.execute("CREATE TABLE \"__tbl_scratch__\" (id INTEGER PRIMARY KEY, label TEXT)")
        .await
        .unwrap();

    let report = sync_schema(&db, dir.path(), &demo_schema("VARCHAR(50)", "")).await;
    assert_eq!(report.history, ["Create tbl_demo"]);
    assert!(!report.statements.iter().any(|s| s.contains("RENAME")));

    let names = tables(&db).await;
    assert!(names.contains(&"__tbl_scratch__".to_string()));
    assert!(!names.contains(&"____tbl_scratch____".to_string()));
}

#[tokio::test]
async fn ignored_tables_are_left_alone() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    db.execute("CREATE TABLE tbl_legacy (whatever TEXT)")
        .await
        .unwrap();

    let schema = r#"{"tables":[
        {"name":"tbl_legacy","ignore":"true","fields":[{"name":"id","type":"INTEGER","pkey":"1"}]}]}"#;
    let report = sync_schema(&db, dir.path(), schema).await;
    assert!(report.is_noop());

    let fields = Introspector::new(db.clone()).list_fields("tbl_legacy").await.unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].name, "whatever");
}

// =============================================================================
// Indexes
// =============================================================================

#[tokio::test]
async fn changed_index_is_dropped_and_recreated_once() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    let other = r#"{"name":"ix_code","fields":"code"}"#;
    sync_schema(&db, dir.path(), &demo_schema("VARCHAR(50)", &format!("{INDEXED},{other}"))).await;

    let changed = r#"{"name":"ix_demo","fields":"name, code"}"#;
    let report = sync_schema(&db, dir.path(), &demo_schema("VARCHAR(50)", &format!("{changed},{other}"))).await;
    assert_eq!(report.history, ["Alter ix_demo on tbl_demo"]);
    let drops = report.statements.iter().filter(|s| s.starts_with("DROP INDEX")).count();
    let creates = report.statements.iter().filter(|s| s.starts_with("CREATE INDEX")).count();
    assert_eq!((drops, creates), (1, 1));

    let indexes = Introspector::new(db.clone()).list_indexes("tbl_demo").await.unwrap();
    assert_eq!(indexes["ix_demo"], ["name", "code"]);
    assert_eq!(indexes["ix_code"], ["code"]);
}

#[tokio::test]
async fn removed_index_is_dropped() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    sync_schema(&db, dir.path(), &demo_schema("VARCHAR(50)", INDEXED)).await;

    let report = sync_schema(&db, dir.path(), &demo_schema("VARCHAR(50)", "")).await;
    assert_eq!(report.history, ["Drop ix_demo on tbl_demo"]);
    let indexes = Introspector::new(db.clone()).list_indexes("tbl_demo").await.unwrap();
    assert!(indexes.is_empty());
}

#[tokio::test]
async fn stray_index_is_gone_after_recreation() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    db.execute(
        "CREATE TABLE tbl_demo (id INTEGER PRIMARY KEY AUTOINCREMENT, \
         name VARCHAR(10) NOT NULL DEFAULT '', code VARCHAR(20) NOT NULL DEFAULT '')",
    )
    .await
    .unwrap();
    db.execute("CREATE INDEX tbl_demo_stray ON tbl_demo (code)")
        .await
        .unwrap();
    db.execute("INSERT INTO tbl_demo (name, code) VALUES ('kept', 'k')")
        .await
        .unwrap();

    let report = sync_schema(&db, dir.path(), &demo_schema("VARCHAR(50)", INDEXED)).await;
    assert_eq!(report.history, ["Alter tbl_demo", "Create ix_demo on tbl_demo"]);

    let indexes = Introspector::new(db.clone()).list_indexes("tbl_demo").await.unwrap();
    assert_eq!(indexes.keys().collect::<Vec<_>>(), ["ix_demo"]);
    let stray = db
        .fetch_count("SELECT COUNT(*) FROM sqlite_master WHERE name = 'tbl_demo_stray'")
        .await
        .unwrap();
    assert_eq!(stray, 0);
    assert_eq!(count(&db, "tbl_demo").await, 1);
}

// =============================================================================
// Satellites
// =============================================================================

const APPS_SCHEMA: &str = r#"{"tables":[
    {"name":"tbl_users","fields":[{"name":"id","type":"INTEGER","pkey":"1"}]},
    {"name":"tbl_groups","fields":[{"name":"id","type":"INTEGER","pkey":"1"}]},
    {"name":"tbl_apps","fields":[
        {"name":"id","type":"INTEGER","pkey":"1"},
        {"name":"code","type":"VARCHAR(50)"},
        {"name":"table","type":"VARCHAR(50)"},
        {"name":"has_index","type":"INT(11)"},
        {"name":"has_notes","type":"INT(11)"}]},
    {"name":"app_customers","fields":[
        {"name":"id","type":"INTEGER","pkey":"1"},
        {"name":"user_id","type":"INT(11)","fkey":"tbl_users"}]}]}"#;

const APPS_DATA: &str = r#"{"tables":[{"name":"tbl_apps","rows":[
    {"id":"1","code":"customers","table":"app_customers","has_index":"1","has_notes":"1"}]}]}"#;

#[tokio::test]
async fn satellites_and_foreign_key_indexes_are_created() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    let sync = synchronizer(&db, dir.path(), APPS_SCHEMA, APPS_DATA).await;
    let reports = sync.bootstrap().await.unwrap();

    let names = tables(&db).await;
    assert!(names.contains(&"app_customers_index".to_string()));
    assert!(names.contains(&"app_customers_notes".to_string()));
    assert!(!names.contains(&"app_customers_control".to_string()));

    let introspector = Introspector::new(db.clone());
    let indexes = introspector.list_indexes("app_customers").await.unwrap();
    assert_eq!(indexes["app_customers_user_id"], ["user_id"]);
    // No fulltext on SQLite: the search index degrades to a plain one.
    let indexes = introspector.list_indexes("app_customers_index").await.unwrap();
    assert_eq!(indexes["app_customers_index_search"], ["search"]);
    let indexes = introspector.list_indexes("app_customers_notes").await.unwrap();
    assert_eq!(indexes["app_customers_notes_reg_id"], ["reg_id"]);

    assert_eq!(reports[1].history, ["tbl_apps: from 0 to 1"]);
    assert_eq!(count(&db, "tbl_apps").await, 1);
}

// =============================================================================
// Static data
// =============================================================================

const PERMS_SCHEMA: &str = r#"{"tables":[{"name":"tbl_perms","fields":[
    {"name":"id","type":"INTEGER","pkey":"1"},
    {"name":"group_id","type":"INT(11)"},
    {"name":"app_id","type":"INT(11)"},
    {"name":"label","type":"VARCHAR(5)"}]}]}"#;

#[tokio::test]
async fn static_rows_fan_out_list_fields() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    let data = r#"{"tables":[{"name":"tbl_perms","rows":[
        {"group_id":"1,2,3","app_id":"5","label":"a,b"}]}]}"#;
    let sync = synchronizer(&db, dir.path(), PERMS_SCHEMA, data).await;
    let reports = sync.bootstrap().await.unwrap();

    assert_eq!(reports[1].history, ["tbl_perms: from 0 to 3"]);
    let groups = db
        .fetch_column(
            "SELECT CAST(group_id AS TEXT) FROM tbl_perms ORDER BY group_id",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(groups, ["1", "2", "3"]);
    let labels = db
        .fetch_column("SELECT DISTINCT label FROM tbl_perms", &[])
        .await
        .unwrap();
    assert_eq!(labels, ["a,b"]);
}

#[tokio::test]
async fn static_users_list_expands_to_three_rows() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    let schema = r#"{"tables":[{"name":"tbl_shares","fields":[
        {"name":"id","type":"INTEGER","pkey":"1"},
        {"name":"users_id","type":"INT(11)"},
        {"name":"note","type":"TEXT"}]}]}"#;
    let data = r#"{"tables":[{"name":"tbl_shares","rows":[{"users_id":"1,2,3","note":"same"}]}]}"#;
    let sync = synchronizer(&db, dir.path(), schema, data).await;
    sync.bootstrap().await.unwrap();

    assert_eq!(count(&db, "tbl_shares").await, 3);
    let notes = db
        .fetch_column("SELECT DISTINCT note FROM tbl_shares", &[])
        .await
        .unwrap();
    assert_eq!(notes, ["same"]);
}

#[tokio::test]
async fn static_pass_replaces_existing_rows() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    sync_schema(&db, dir.path(), PERMS_SCHEMA).await;
    for _ in 0..4 {
        db.execute("INSERT INTO tbl_perms (group_id, app_id, label) VALUES (9, 9, 'x')")
            .await
            .unwrap();
    }

    let data = r#"{"tables":[{"name":"tbl_perms","rows":[
        {"group_id":"1","app_id":"2","label":"truncated"}]}]}"#;
    let sync = synchronizer(&db, dir.path(), PERMS_SCHEMA, data).await;
    let report = sync.sync(SyncKind::Static).await.unwrap();
    assert_eq!(report.history, ["tbl_perms: from 4 to 1"]);

    let labels = db.fetch_column("SELECT label FROM tbl_perms", &[]).await.unwrap();
    assert_eq!(labels, ["trunc"]);
}

#[tokio::test]
async fn static_rows_are_batched_and_counted() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    let schema = r#"{"tables":[
        {"name":"tbl_perms","fields":[
            {"name":"id","type":"INTEGER","pkey":"1"},
            {"name":"group_id","type":"INT(11)"},
            {"name":"app_id","type":"INT(11)"},
            {"name":"label","type":"VARCHAR(5)"}]},
        {"name":"tbl_groups","fields":[
            {"name":"id","type":"INTEGER","pkey":"1"},
            {"name":"name","type":"VARCHAR(20)"}]}]}"#;
    sync_schema(&db, dir.path(), schema).await;
    for _ in 0..4 {
        db.execute("INSERT INTO tbl_perms (group_id, app_id, label) VALUES (9, 9, 'x')")
            .await
            .unwrap();
    }
    db.execute("INSERT INTO tbl_groups (name) VALUES ('old')")
        .await
        .unwrap();

    // 400 rows of three values each need two statements under SQLite's
    // 999 bind parameter limit.
    let groups: Vec<String> = (1..=400).map(|i| i.to_string()).collect();
    let data = format!(
        r#"{{"tables":[
            {{"name":"tbl_perms","rows":[{{"group_id":"{}","app_id":"1","label":"a"}}]}},
            {{"name":"tbl_groups","rows":[{{"id":"1","name":"admins"}},{{"id":"2","name":"users"}}]}}]}}"#,
        groups.join(",")
    );
    let sync = synchronizer(&db, dir.path(), schema, &data).await;
    let report = sync.sync(SyncKind::Static).await.unwrap();

    assert_eq!(
        report.history,
        ["tbl_perms: from 4 to 400", "tbl_groups: from 1 to 2"]
    );
    assert_eq!(report.count(), 396 + 1);
    let perms_inserts = report
        .statements
        .iter()
        .filter(|s| s.starts_with("INSERT INTO \"tbl_perms\""))
        .count();
    let groups_inserts = report
        .statements
        .iter()
        .filter(|s| s.starts_with("INSERT INTO \"tbl_groups\""))
        .count();
    assert_eq!((perms_inserts, groups_inserts), (2, 1));
    assert_eq!(count(&db, "tbl_perms").await, 400);
    assert_eq!(count(&db, "tbl_groups").await, 2);
}

#[tokio::test]
async fn static_row_with_unknown_field_fails() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    let data = r#"{"tables":[{"name":"tbl_perms","rows":[{"group_id":"1","colour":"red"}]}]}"#;
    let sync = synchronizer(&db, dir.path(), PERMS_SCHEMA, data).await;
    sync.sync(SyncKind::Schema).await.unwrap();

    let err = sync.sync(SyncKind::Static).await.unwrap_err();
    assert!(matches!(err, SyncError::UnknownField { ref fields, .. } if fields == "colour"));
    assert!(!sync.check(SyncKind::Static).await.unwrap());
}

// =============================================================================
// Gate and semaphore
// =============================================================================

#[tokio::test]
async fn pass_waits_for_semaphore_then_times_out() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    let sync = synchronizer(&db, dir.path(), PERMS_SCHEMA, "{}").await;

    let held = Semaphore::new(dir.path(), "db_schema").acquire().await.unwrap();
    let err = sync.sync(SyncKind::Schema).await.unwrap_err();
    assert!(matches!(err, SyncError::LockTimeout { .. }));
    assert!(tables(&db).await.is_empty());

    drop(held);
    let report = sync.sync(SyncKind::Schema).await.unwrap();
    assert_eq!(report.history, ["Create tbl_perms"]);
}

#[tokio::test]
async fn current_hash_skips_without_semaphore() {
    let db = memory_db().await;
    let dir = tempfile::tempdir().unwrap();
    let sync = synchronizer(&db, dir.path(), PERMS_SCHEMA, "{}").await;
    sync.sync(SyncKind::Schema).await.unwrap();

    let _held = Semaphore::new(dir.path(), "db_schema").acquire().await.unwrap();
    let report = sync.sync(SyncKind::Schema).await.unwrap();
    assert!(report.skipped);
}
