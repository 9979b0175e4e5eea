//! Static data synchronization.
//!
//! Every table named in the static document is emptied and refilled with
//! its canonical rows. Identifier fields may hold comma separated lists,
//! which expand into one row per element.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::info;

use crate::db::{Database, SqlValue};
use crate::dialect::dialect_for;
use crate::error::{Result, SyncError};
use crate::executor::Executor;
use crate::introspect::Introspector;
use crate::live::{LiveSchema, LiveTable};
use crate::operations::SyncOperation;
use crate::planner::Plan;
use crate::report::{SyncKind, SyncReport};
use crate::spec::{StaticDocument, StaticRow};
use crate::types::{type_size, TypeClass};

/// Returns true if `field` may hold a comma separated list.
#[must_use]
pub fn is_list_field(field: &str) -> bool {
    field == "id" || field.starts_with("id_") || field.ends_with("_id")
}

/// Expands comma separated identifier lists into one row per element.
///
/// The first list field found is expanded; later list fields are expanded
/// in each of the resulting rows, so `{"id": "1,2", "user_id": "3,4"}`
/// yields four rows.
#[must_use]
pub fn expand_row(row: &StaticRow) -> Vec<StaticRow> {
    let list = row
        .0
        .iter()
        .find(|(field, value)| is_list_field(field) && value.contains(','));
    let Some((field, value)) = list else {
        return vec![row.clone()];
    };
    value
        .split(',')
        .flat_map(|part| {
            let mut sub = row.clone();
            sub.0.insert(field.clone(), part.trim().to_string());
            expand_row(&sub)
        })
        .collect()
}

fn leading_int(value: &str) -> i64 {
    let value = value.trim_start();
    let end = value
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    value[..end].parse().unwrap_or(0)
}

fn leading_float(value: &str) -> f64 {
    let value = value.trim();
    if let Ok(number) = value.parse() {
        return number;
    }
    let mut seen_dot = false;
    let end = value
        .char_indices()
        .take_while(|(i, c)| {
            if c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')) {
                true
            } else if *c == '.' && !seen_dot {
                seen_dot = true;
                true
            } else {
                false
            }
        })
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    value[..end].parse().unwrap_or(0.0)
}

/// Casts a static value to what a column of `sql_type` accepts.
pub fn cast_value(value: &str, sql_type: &str) -> Result<SqlValue> {
    let class = TypeClass::of(sql_type)?;
    let cast = match class {
        TypeClass::Int => SqlValue::Int(leading_int(value)),
        TypeClass::Float => SqlValue::Float(leading_float(value)),
        TypeClass::Date | TypeClass::Time | TypeClass::DateTime => {
            if value.is_empty() {
                SqlValue::Text(class.zero_value().to_string())
            } else {
                SqlValue::Text(value.to_string())
            }
        }
        TypeClass::String => {
            let size = usize::try_from(type_size(sql_type)?).unwrap_or(usize::MAX);
            SqlValue::Text(value.chars().take(size).collect())
        }
    };
    Ok(cast)
}

/// Casts `row` into the column list and values of an insert, in live
/// field order.
fn row_values(
    table: &str,
    row: &StaticRow,
    live: &LiveTable,
) -> Result<(Vec<String>, Vec<SqlValue>)> {
    let unknown: Vec<&str> = row
        .0
        .keys()
        .filter(|field| live.get_field(field).is_none())
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(SyncError::UnknownField {
            table: table.to_string(),
            fields: unknown.join(", "),
        });
    }

    let mut columns = Vec::new();
    let mut values = Vec::new();
    for field in &live.fields {
        if let Some(value) = row.get(&field.name) {
            columns.push(field.name.clone());
            values.push(cast_value(value, &field.sql_type)?);
        }
    }
    Ok((columns, values))
}

/// Expanded rows of one table, grouped by column list in first-seen order.
#[derive(Default)]
struct TableRows {
    total: usize,
    groups: IndexMap<Vec<String>, Vec<Vec<SqlValue>>>,
}

/// Plans the static pass.
///
/// Each distinct table becomes one step that clears the table and inserts
/// its expanded rows, one batched insert per distinct column list. `counts`
/// holds the current row count of each table; it feeds the history line and
/// the step's change count, the distance between the old and new counts.
pub fn plan_static(
    doc: &StaticDocument,
    live: &LiveSchema,
    counts: &BTreeMap<String, i64>,
) -> Result<Plan> {
    let mut tables: IndexMap<&str, TableRows> = IndexMap::new();
    for table in &doc.tables {
        let live_table = live.get_table(&table.name).ok_or_else(|| {
            SyncError::Config(format!("Static data for unknown table '{}'", table.name))
        })?;
        let rows = tables.entry(table.name.as_str()).or_default();
        for row in &table.rows {
            for expanded in expand_row(row) {
                let (columns, values) = row_values(&table.name, &expanded, live_table)?;
                rows.groups.entry(columns).or_default().push(values);
                rows.total += 1;
            }
        }
    }

    let mut plan = Plan::default();
    for (name, rows) in tables {
        let from = counts.get(name).copied().unwrap_or(0);
        let to = i64::try_from(rows.total).unwrap_or(i64::MAX);
        let changes = usize::try_from(to.abs_diff(from)).unwrap_or(usize::MAX);
        let mut operations = Vec::with_capacity(rows.groups.len() + 1);
        operations.push(SyncOperation::ClearTable {
            name: name.to_string(),
        });
        for (columns, group) in rows.groups {
            operations.push(SyncOperation::InsertRows {
                table: name.to_string(),
                columns,
                rows: group,
            });
        }
        plan.push_counted(format!("{name}: from {from} to {to}"), changes, operations);
    }
    Ok(plan)
}

/// Runs the static pass against a database.
pub struct StaticSynchronizer {
    db: Database,
    introspector: Introspector,
}

impl StaticSynchronizer {
    /// Creates a new static synchronizer.
    #[must_use]
    pub fn new(db: Database) -> Self {
        let introspector = Introspector::new(db.clone());
        Self { db, introspector }
    }

    /// Reads the tables named in `doc` and plans the pass.
    pub async fn plan(&self, doc: &StaticDocument) -> Result<Plan> {
        let dialect = dialect_for(self.db.backend());
        let mut live = LiveSchema::new();
        let mut counts = BTreeMap::new();
        for table in &doc.tables {
            if live.contains(&table.name) {
                continue;
            }
            let fields = self.introspector.list_fields(&table.name).await?;
            if fields.is_empty() {
                continue;
            }
            let sql = format!("SELECT COUNT(*) FROM {}", dialect.quote_identifier(&table.name));
            counts.insert(table.name.clone(), self.db.fetch_count(&sql).await?);
            live.insert(
                table.name.clone(),
                LiveTable {
                    fields,
                    indexes: BTreeMap::new(),
                },
            );
        }
        plan_static(doc, &live, &counts)
    }

    /// Clears and refills every table of `doc`.
    pub async fn run(&self, doc: &StaticDocument, dry_run: bool) -> Result<SyncReport> {
        let plan = self.plan(doc).await?;
        let mut report = SyncReport::new(SyncKind::Static);
        Executor::new(self.db.clone())
            .dry_run(dry_run)
            .execute(&plan, &mut report)
            .await?;
        info!(
            tables = report.history.len(),
            changes = report.count(),
            dry_run,
            "Static data synchronized"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::LiveField;

    fn row(pairs: &[(&str, &str)]) -> StaticRow {
        StaticRow::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_list_fields() {
        assert!(is_list_field("id"));
        assert!(is_list_field("id_app"));
        assert!(is_list_field("user_id"));
        assert!(!is_list_field("idea"));
        assert!(!is_list_field("name"));
    }

    #[test]
    fn test_expand_three_rows() {
        let rows = expand_row(&row(&[("id", "1,2,3"), ("name", "a,b")]));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("id"), Some("1"));
        assert_eq!(rows[2].get("id"), Some("3"));
        assert!(rows.iter().all(|r| r.get("name") == Some("a,b")));
    }

    #[test]
    fn test_expand_is_recursive() {
        let rows = expand_row(&row(&[("app_id", "1,2"), ("perm_id", "3,4")]));
        let pairs: Vec<_> = rows
            .iter()
            .map(|r| (r.get("app_id").unwrap(), r.get("perm_id").unwrap()))
            .collect();
        assert_eq!(pairs, [("1", "3"), ("1", "4"), ("2", "3"), ("2", "4")]);
    }

    #[test]
    fn test_cast_value() {
        assert_eq!(cast_value("42abc", "INT(11)").unwrap(), SqlValue::Int(42));
        assert_eq!(cast_value("-7", "INTEGER").unwrap(), SqlValue::Int(-7));
        assert_eq!(cast_value("abc", "INT").unwrap(), SqlValue::Int(0));
        assert_eq!(cast_value("1.5x", "DECIMAL(5,2)").unwrap(), SqlValue::Float(1.5));
        assert_eq!(
            cast_value("", "DATETIME").unwrap(),
            SqlValue::Text("1970-01-01 00:00:00".to_string())
        );
        assert_eq!(
            cast_value("abcdef", "VARCHAR(3)").unwrap(),
            SqlValue::Text("abc".to_string())
        );
        assert!(cast_value("x", "BLOB").is_err());
    }

    fn apps_live() -> LiveSchema {
        let mut live = LiveSchema::new();
        live.insert(
            "tbl_apps",
            LiveTable {
                fields: vec![
                    LiveField::new("id", "INTEGER"),
                    LiveField::new("code", "VARCHAR(255)"),
                    LiveField::new("active", "INT(11)"),
                ],
                indexes: BTreeMap::new(),
            },
        );
        live
    }

    #[test]
    fn test_plan_static() {
        let doc = StaticDocument::from_json(
            r#"{"tables": [
                {"name": "tbl_apps", "rows": [{"code": "a", "id": "1,2"}]},
                {"name": "tbl_apps", "rows": [{"id": "3", "code": "b", "active": "1"}]}
            ]}"#,
        )
        .unwrap();
        let counts = BTreeMap::from([("tbl_apps".to_string(), 5)]);
        let plan = plan_static(&doc, &apps_live(), &counts).unwrap();

        assert_eq!(plan.summaries().collect::<Vec<_>>(), ["tbl_apps: from 5 to 3"]);
        assert_eq!(plan.steps[0].changes, 2);
        let ops = &plan.steps[0].operations;
        assert_eq!(ops.len(), 3);
        assert!(matches!(ops[0], SyncOperation::ClearTable { .. }));
        match &ops[1] {
            SyncOperation::InsertRows { columns, rows, .. } => {
                assert_eq!(columns, &["id", "code"]);
                assert_eq!(
                    rows,
                    &[
                        vec![SqlValue::Int(1), SqlValue::Text("a".to_string())],
                        vec![SqlValue::Int(2), SqlValue::Text("a".to_string())],
                    ]
                );
            }
            other => panic!("unexpected operation {other:?}"),
        }
        match &ops[2] {
            SyncOperation::InsertRows { columns, rows, .. } => {
                assert_eq!(columns, &["id", "code", "active"]);
                assert_eq!(rows.len(), 1);
            }
            other => panic!("unexpected operation {other:?}"),
        }
    }

    #[test]
    fn test_unknown_field() {
        let doc = StaticDocument::from_json(
            r#"{"tables": [{"name": "tbl_apps", "rows": [{"id": "1", "colour": "red"}]}]}"#,
        )
        .unwrap();
        let err = plan_static(&doc, &apps_live(), &BTreeMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "Unused data 'colour' for table 'tbl_apps'");
    }

    #[test]
    fn test_empty_row_inserts_defaults() {
        let doc = StaticDocument::from_json(r#"{"tables": [{"name": "tbl_apps", "rows": [{}]}]}"#)
            .unwrap();
        let plan = plan_static(&doc, &apps_live(), &BTreeMap::new()).unwrap();
        match &plan.steps[0].operations[1] {
            SyncOperation::InsertRows { columns, rows, .. } => {
                assert!(columns.is_empty());
                assert_eq!(rows, &[Vec::<SqlValue>::new()]);
            }
            other => panic!("unexpected operation {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_replaces_rows() {
        let db = Database::connect("sqlite::memory:", 1).await.unwrap();
        db.execute(
            "CREATE TABLE tbl_apps (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             code VARCHAR(255) NOT NULL DEFAULT '', active INT(11) NOT NULL DEFAULT '0')",
        )
        .await
        .unwrap();
        db.execute("INSERT INTO tbl_apps (id, code) VALUES (9, 'old')")
            .await
            .unwrap();

        let doc = StaticDocument::from_json(
            r#"{"tables": [{"name": "tbl_apps", "rows": [{"id": "1,2,3", "code": "x"}]}]}"#,
        )
        .unwrap();
        let report = StaticSynchronizer::new(db.clone()).run(&doc, false).await.unwrap();

        assert_eq!(report.history, ["tbl_apps: from 1 to 3"]);
        assert_eq!(report.count(), 2);
        let inserts: Vec<_> = report
            .statements
            .iter()
            .filter(|s| s.starts_with("INSERT INTO"))
            .collect();
        assert_eq!(inserts.len(), 1);
        assert_eq!(db.fetch_count("SELECT COUNT(*) FROM tbl_apps").await.unwrap(), 3);
        let old = db
            .fetch_optional("SELECT code FROM tbl_apps WHERE id = 9", &[])
            .await
            .unwrap();
        assert_eq!(old, None);
    }
}
