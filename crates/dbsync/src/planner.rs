//! Schema pass planning.
//!
//! Compares the catalog against a live snapshot and produces the steps that
//! make the database match. Planning is pure: every emitted operation is
//! replayed onto a private copy of the snapshot, and nothing touches the
//! database until the executor runs the plan.
//!
//! Tables are never altered in place. A table whose column shape differs is
//! renamed to its backup name `__{table}__`, recreated, refilled from the
//! backup and the backup dropped. Tables that disappear from the schema are
//! only renamed to their backup name, so their data can come back if the
//! table is added again.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{CatalogTable, SchemaCatalog};
use crate::error::{Result, SyncError};
use crate::hash::content_hash;
use crate::introspect::Capabilities;
use crate::live::{LiveSchema, LiveTable};
use crate::operations::{ColumnDef, CopySource, SyncOperation};
use crate::types::{normalize_type, TypeClass};

/// Backup name of a table.
#[must_use]
pub fn backup_name(table: &str) -> String {
    format!("__{table}__")
}

/// Returns true if `name` looks like a backup table.
#[must_use]
pub fn is_backup_name(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

/// Hash of an ordered `(name, type)` column list.
///
/// Types are normalized first so that spelling differences between the
/// schema and what the database reports do not count as changes.
pub fn shape_hash<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<String> {
    let shape: Vec<(&str, String)> = fields
        .into_iter()
        .map(|(name, sql_type)| (name, normalize_type(sql_type)))
        .collect();
    content_hash(&shape)
}

fn live_shape(table: &LiveTable) -> Result<String> {
    shape_hash(
        table
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.sql_type.as_str())),
    )
}

fn catalog_shape(table: &CatalogTable) -> Result<String> {
    shape_hash(
        table
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.sql_type.as_str())),
    )
}

/// A group of operations reported as one history line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanStep {
    /// History line, e.g. `Alter tbl_demo`.
    pub summary: String,
    /// Operations in execution order.
    pub operations: Vec<SyncOperation>,
    /// How much this step adds to the reported change count.
    pub changes: usize,
}

/// Ordered steps for one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plan {
    /// Steps in execution order.
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Returns true if nothing needs to be done.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// History lines, in order.
    pub fn summaries(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.summary.as_str())
    }

    /// All operations, in order.
    pub fn operations(&self) -> impl Iterator<Item = &SyncOperation> {
        self.steps.iter().flat_map(|s| s.operations.iter())
    }

    /// Appends a step counted as one change.
    pub fn push(&mut self, summary: impl Into<String>, operations: Vec<SyncOperation>) {
        self.push_counted(summary, 1, operations);
    }

    /// Appends a step counted as `changes` changes.
    pub fn push_counted(
        &mut self,
        summary: impl Into<String>,
        changes: usize,
        operations: Vec<SyncOperation>,
    ) {
        self.steps.push(PlanStep {
            summary: summary.into(),
            operations,
            changes,
        });
    }
}

/// Plans the schema pass.
#[derive(Debug)]
pub struct Planner<'a> {
    catalog: &'a SchemaCatalog,
    capabilities: &'a Capabilities,
    reserved: BTreeSet<String>,
}

impl<'a> Planner<'a> {
    /// Creates a new planner.
    #[must_use]
    pub fn new(catalog: &'a SchemaCatalog, capabilities: &'a Capabilities) -> Self {
        Self {
            catalog,
            capabilities,
            reserved: BTreeSet::new(),
        }
    }

    /// Excludes a table the synchronizer manages itself.
    #[must_use]
    pub fn reserve(mut self, table: impl Into<String>) -> Self {
        self.reserved.insert(table.into());
        self
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.catalog.ignored().contains(name) || self.reserved.contains(name)
    }

    /// Plans the operations that take `live` to the catalog's schema.
    pub fn plan(&self, live: &LiveSchema) -> Result<Plan> {
        let mut state = live.clone();
        let mut plan = Plan::default();

        let orphans: Vec<String> = live
            .table_names()
            .filter(|name| !self.is_excluded(name))
            .filter(|name| !is_backup_name(name))
            .filter(|name| !self.catalog.contains(name))
            .map(ToString::to_string)
            .collect();
        for name in orphans {
            let backup = backup_name(&name);
            ensure_no_backup(&state, &name, &backup)?;
            info!(table = %name, backup = %backup, "Keeping backup of table missing from schema");
            let ops = vec![SyncOperation::rename_table(&name, &backup)];
            apply(&mut state, &mut plan, format!("Rename {name} to {backup}"), ops)?;
        }

        for table in self.catalog.tables() {
            if self.is_excluded(&table.name) {
                continue;
            }
            self.plan_table(table, &mut state, &mut plan)?;
            self.plan_indexes(table, &mut state, &mut plan)?;
        }

        Ok(plan)
    }

    fn plan_table(&self, table: &CatalogTable, state: &mut LiveSchema, plan: &mut Plan) -> Result<()> {
        let name = table.name.as_str();
        let backup = backup_name(name);
        let wanted = catalog_shape(table)?;

        let (summary, ops) = match (state.get_table(name), state.get_table(&backup)) {
            (Some(current), _) => {
                if live_shape(current)? == wanted {
                    return Ok(());
                }
                ensure_no_backup(state, name, &backup)?;
                let copy = copy_rows(table, current, &backup)?;
                let ops = vec![
                    SyncOperation::rename_table(name, &backup),
                    self.create_table(table)?,
                    SyncOperation::DropImplicitIndexes {
                        table: name.to_string(),
                    },
                    copy,
                    SyncOperation::drop_table(&backup),
                ];
                (format!("Alter {name}"), ops)
            }
            (None, Some(saved)) if live_shape(saved)? == wanted => (
                format!("Rename {backup} to {name}"),
                vec![SyncOperation::rename_table(&backup, name)],
            ),
            (None, Some(saved)) => {
                let copy = copy_rows(table, saved, &backup)?;
                let ops = vec![
                    self.create_table(table)?,
                    SyncOperation::DropImplicitIndexes {
                        table: name.to_string(),
                    },
                    copy,
                    SyncOperation::drop_table(&backup),
                ];
                (format!("Alter {name} from {backup}"), ops)
            }
            (None, None) => {
                let ops = vec![
                    self.create_table(table)?,
                    SyncOperation::DropImplicitIndexes {
                        table: name.to_string(),
                    },
                ];
                (format!("Create {name}"), ops)
            }
        };

        info!(table = %name, step = %summary, "Planned table change");
        apply(state, plan, summary, ops)
    }

    fn plan_indexes(&self, table: &CatalogTable, state: &mut LiveSchema, plan: &mut Plan) -> Result<()> {
        let name = table.name.as_str();
        let live = state
            .get_table(name)
            .map(|t| t.indexes.clone())
            .unwrap_or_default();

        for index in live.keys() {
            if table.get_index(index).is_none() {
                let ops = vec![SyncOperation::drop_index(index, name)];
                apply(state, plan, format!("Drop {index} on {name}"), ops)?;
            }
        }

        for index in &table.indexes {
            let fulltext = index.fulltext && self.capabilities.fulltext;
            let create = SyncOperation::create_index(&index.name, name, index.fields.clone(), fulltext);
            let (summary, ops) = match live.get(&index.name) {
                Some(fields) if *fields == index.fields => continue,
                Some(_) => (
                    format!("Alter {} on {name}", index.name),
                    vec![SyncOperation::drop_index(&index.name, name), create],
                ),
                None => (format!("Create {} on {name}", index.name), vec![create]),
            };
            if index.fulltext && !fulltext {
                warn!(
                    table = %name,
                    index = %index.name,
                    "Fulltext indexes are not available, creating a plain index"
                );
            }
            apply(state, plan, summary, ops)?;
        }
        Ok(())
    }

    fn create_table(&self, table: &CatalogTable) -> Result<SyncOperation> {
        let columns = table
            .fields
            .iter()
            .map(|field| {
                let zero = TypeClass::of(&field.sql_type)?.zero_value();
                let column = ColumnDef::new(field.name.clone(), field.sql_type.clone(), zero);
                Ok(if field.primary_key {
                    column.primary_key()
                } else {
                    column
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let foreign_keys = table
            .fields
            .iter()
            .filter_map(|f| f.foreign_key.as_ref().map(|t| (f.name.clone(), t.clone())))
            .collect();
        Ok(SyncOperation::create_table(
            table.name.clone(),
            columns,
            foreign_keys,
            self.capabilities.engine_for(table.fulltext),
        ))
    }
}

fn ensure_no_backup(state: &LiveSchema, table: &str, backup: &str) -> Result<()> {
    if state.contains(backup) {
        return Err(SyncError::BackupConflict {
            table: table.to_string(),
            backup: backup.to_string(),
        });
    }
    Ok(())
}

/// Copies every destination column from the source column of the same name,
/// or from the type's zero value when the source lacks it.
fn copy_rows(table: &CatalogTable, source: &LiveTable, source_name: &str) -> Result<SyncOperation> {
    let columns = table
        .fields
        .iter()
        .map(|field| {
            let from = if source.get_field(&field.name).is_some() {
                CopySource::Column
            } else {
                CopySource::Literal(TypeClass::of(&field.sql_type)?.zero_value().to_string())
            };
            Ok((field.name.clone(), from))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SyncOperation::CopyRows {
        target: table.name.clone(),
        source: source_name.to_string(),
        columns,
    })
}

fn apply(
    state: &mut LiveSchema,
    plan: &mut Plan,
    summary: String,
    operations: Vec<SyncOperation>,
) -> Result<()> {
    for op in &operations {
        state.apply_operation(op)?;
    }
    plan.push(summary, operations);
    Ok(())
}
