//! Snapshot of the live database structure.
//!
//! The planner replays the operations it emits onto a snapshot so that
//! later decisions (index reconciliation in particular) see the database
//! as it will be, not as it was when the pass started.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Result, SyncError};
use crate::operations::SyncOperation;

/// An introspected column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveField {
    /// Column name.
    pub name: String,
    /// Uppercase column type as reported by the database.
    pub sql_type: String,
}

impl LiveField {
    /// Creates a live field, uppercasing the type.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: &str) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.trim().to_ascii_uppercase(),
        }
    }
}

/// An introspected table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LiveTable {
    /// Columns in order.
    pub fields: Vec<LiveField>,
    /// Index name to ordered field list, primary key excluded.
    pub indexes: BTreeMap<String, Vec<String>>,
}

impl LiveTable {
    /// Gets a field by name.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&LiveField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The live structure of every table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LiveSchema {
    tables: BTreeMap<String, LiveTable>,
}

impl LiveSchema {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a table.
    pub fn insert(&mut self, name: impl Into<String>, table: LiveTable) {
        self.tables.insert(name.into(), table);
    }

    /// Returns true if the table exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&LiveTable> {
        self.tables.get(name)
    }

    /// Table names, sorted.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if there are no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut LiveTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| SyncError::InvalidState(format!("Table '{name}' does not exist")))
    }

    /// Applies a single operation to the snapshot.
    pub fn apply_operation(&mut self, operation: &SyncOperation) -> Result<()> {
        match operation {
            SyncOperation::CreateTable { name, columns, .. } => {
                if self.contains(name) {
                    return Err(SyncError::InvalidState(format!(
                        "Table '{name}' already exists"
                    )));
                }
                let fields = columns
                    .iter()
                    .map(|c| LiveField::new(c.name.clone(), &c.sql_type))
                    .collect();
                self.insert(
                    name.clone(),
                    LiveTable {
                        fields,
                        indexes: BTreeMap::new(),
                    },
                );
            }

            SyncOperation::RenameTable { old_name, new_name } => {
                if self.contains(new_name) {
                    return Err(SyncError::InvalidState(format!(
                        "Table '{new_name}' already exists"
                    )));
                }
                let table = self.tables.remove(old_name).ok_or_else(|| {
                    SyncError::InvalidState(format!("Table '{old_name}' does not exist"))
                })?;
                self.tables.insert(new_name.clone(), table);
            }

            SyncOperation::DropTable { name } => {
                self.tables.remove(name).ok_or_else(|| {
                    SyncError::InvalidState(format!("Table '{name}' does not exist"))
                })?;
            }

            SyncOperation::CreateIndex {
                name,
                table,
                columns,
                ..
            } => {
                let t = self.table_mut(table)?;
                if t.indexes.contains_key(name) {
                    return Err(SyncError::InvalidState(format!(
                        "Index '{name}' already exists on table '{table}'"
                    )));
                }
                t.indexes.insert(name.clone(), columns.clone());
            }

            SyncOperation::DropIndex { name, table } => {
                let t = self.table_mut(table)?;
                t.indexes.remove(name).ok_or_else(|| {
                    SyncError::InvalidState(format!(
                        "Index '{name}' does not exist on table '{table}'"
                    ))
                })?;
            }

            SyncOperation::DropImplicitIndexes { table } => {
                self.table_mut(table)?.indexes.clear();
            }

            SyncOperation::CopyRows { target, source, .. } => {
                self.table_mut(source)?;
                self.table_mut(target)?;
            }

            SyncOperation::ClearTable { name } | SyncOperation::InsertRows { table: name, .. } => {
                self.table_mut(name)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::ColumnDef;

    fn demo() -> LiveSchema {
        let mut live = LiveSchema::new();
        let mut table = LiveTable {
            fields: vec![LiveField::new("id", "integer"), LiveField::new("name", "varchar(50)")],
            indexes: BTreeMap::new(),
        };
        table
            .indexes
            .insert("tbl_demo_name".to_string(), vec!["name".to_string()]);
        live.insert("tbl_demo", table);
        live
    }

    #[test]
    fn test_types_are_uppercased() {
        let live = demo();
        let table = live.get_table("tbl_demo").unwrap();
        assert_eq!(table.get_field("name").unwrap().sql_type, "VARCHAR(50)");
    }

    #[test]
    fn test_rename_keeps_indexes() {
        let mut live = demo();
        live.apply_operation(&SyncOperation::rename_table("tbl_demo", "__tbl_demo__"))
            .unwrap();
        assert!(!live.contains("tbl_demo"));
        let backup = live.get_table("__tbl_demo__").unwrap();
        assert_eq!(backup.indexes.len(), 1);
    }

    #[test]
    fn test_create_starts_without_indexes() {
        let mut live = LiveSchema::new();
        live.apply_operation(&SyncOperation::create_table(
            "t",
            vec![ColumnDef::new("id", "INTEGER", "0").primary_key()],
            Vec::new(),
            None,
        ))
        .unwrap();
        assert!(live.get_table("t").unwrap().indexes.is_empty());
        assert!(live
            .apply_operation(&SyncOperation::create_table("t", Vec::new(), Vec::new(), None))
            .is_err());
    }

    #[test]
    fn test_index_operations() {
        let mut live = demo();
        live.apply_operation(&SyncOperation::drop_index("tbl_demo_name", "tbl_demo"))
            .unwrap();
        assert!(live
            .apply_operation(&SyncOperation::drop_index("tbl_demo_name", "tbl_demo"))
            .is_err());
        live.apply_operation(&SyncOperation::create_index(
            "tbl_demo_id_name",
            "tbl_demo",
            vec!["id".to_string(), "name".to_string()],
            false,
        ))
        .unwrap();
        assert_eq!(
            live.get_table("tbl_demo").unwrap().indexes["tbl_demo_id_name"],
            ["id", "name"]
        );
    }

    #[test]
    fn test_drop_missing_table() {
        let mut live = LiveSchema::new();
        assert!(matches!(
            live.apply_operation(&SyncOperation::drop_table("nope")),
            Err(SyncError::InvalidState(_))
        ));
    }
}
