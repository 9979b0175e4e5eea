//! Synchronization operations.
//!
//! Every change a pass makes to the database is expressed as one of these
//! operations. Types, names and engines are already resolved for the active
//! backend when an operation is built, so the dialects only format SQL.

use serde::{Deserialize, Serialize};

use crate::db::SqlValue;

/// Column definition for a table being created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Uppercase column type.
    pub sql_type: String,
    /// Whether this is the auto-increment primary key.
    pub primary_key: bool,
    /// Zero value used as the column default.
    pub default: String,
}

impl ColumnDef {
    /// Creates a regular column with a default value.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            primary_key: false,
            default: default.into(),
        }
    }

    /// Marks the column as the auto-increment primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}

/// Where a column gets its value from during a copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CopySource {
    /// The column of the same name in the source table.
    Column,
    /// A quoted literal, used when the source has no such column.
    Literal(String),
}

/// A single synchronization operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncOperation {
    /// Create a new table.
    CreateTable {
        /// Table name.
        name: String,
        /// Column definitions.
        columns: Vec<ColumnDef>,
        /// Foreign keys as (field, referenced table).
        foreign_keys: Vec<(String, String)>,
        /// Storage engine (MySQL only).
        engine: Option<String>,
    },

    /// Rename a table.
    RenameTable {
        /// Old table name.
        old_name: String,
        /// New table name.
        new_name: String,
    },

    /// Copy rows from one table into another with `INSERT ... SELECT`.
    CopyRows {
        /// Destination table.
        target: String,
        /// Source table.
        source: String,
        /// Destination columns and where each gets its value.
        columns: Vec<(String, CopySource)>,
    },

    /// Drop a table.
    DropTable {
        /// Table name.
        name: String,
    },

    /// Create an index.
    CreateIndex {
        /// Index name.
        name: String,
        /// Table name.
        table: String,
        /// Columns to index.
        columns: Vec<String>,
        /// Whether to create a fulltext index.
        fulltext: bool,
    },

    /// Drop an index.
    DropIndex {
        /// Index name.
        name: String,
        /// Table name (MySQL needs it).
        table: String,
    },

    /// Drop every index the backend created on its own for a fresh table.
    ///
    /// The index list is only known once the table exists, so this
    /// operation is expanded by the executor.
    DropImplicitIndexes {
        /// Table name.
        table: String,
    },

    /// Remove every row of a table.
    ClearTable {
        /// Table name.
        name: String,
    },

    /// Insert rows sharing one column list.
    ///
    /// The dialect packs as many rows per `INSERT` as the backend's bind
    /// parameter limit allows.
    InsertRows {
        /// Table name.
        table: String,
        /// Column names.
        columns: Vec<String>,
        /// One value list per row, each bound in column order.
        rows: Vec<Vec<SqlValue>>,
    },
}

impl SyncOperation {
    /// Create table operation.
    #[must_use]
    pub fn create_table(
        name: impl Into<String>,
        columns: Vec<ColumnDef>,
        foreign_keys: Vec<(String, String)>,
        engine: Option<String>,
    ) -> Self {
        Self::CreateTable {
            name: name.into(),
            columns,
            foreign_keys,
            engine,
        }
    }

    /// Rename table operation.
    #[must_use]
    pub fn rename_table(old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self::RenameTable {
            old_name: old_name.into(),
            new_name: new_name.into(),
        }
    }

    /// Drop table operation.
    #[must_use]
    pub fn drop_table(name: impl Into<String>) -> Self {
        Self::DropTable { name: name.into() }
    }

    /// Create index operation.
    #[must_use]
    pub fn create_index(
        name: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<String>,
        fulltext: bool,
    ) -> Self {
        Self::CreateIndex {
            name: name.into(),
            table: table.into(),
            columns,
            fulltext,
        }
    }

    /// Drop index operation.
    #[must_use]
    pub fn drop_index(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self::DropIndex {
            name: name.into(),
            table: table.into(),
        }
    }

    /// Returns the table this operation touches.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { name, .. }
            | Self::DropTable { name }
            | Self::ClearTable { name } => name,
            Self::RenameTable { old_name, .. } => old_name,
            Self::CopyRows { target, .. } => target,
            Self::CreateIndex { table, .. }
            | Self::DropIndex { table, .. }
            | Self::DropImplicitIndexes { table }
            | Self::InsertRows { table, .. } => table,
        }
    }

    /// Returns a human-readable description of this operation.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::CreateTable { name, .. } => format!("Create table '{name}'"),
            Self::RenameTable { old_name, new_name } => {
                format!("Rename table '{old_name}' to '{new_name}'")
            }
            Self::CopyRows { target, source, .. } => {
                format!("Copy rows from '{source}' into '{target}'")
            }
            Self::DropTable { name } => format!("Drop table '{name}'"),
            Self::CreateIndex { name, table, .. } => {
                format!("Create index '{name}' on table '{table}'")
            }
            Self::DropIndex { name, table } => format!("Drop index '{name}' on table '{table}'"),
            Self::DropImplicitIndexes { table } => {
                format!("Drop implicit indexes on table '{table}'")
            }
            Self::ClearTable { name } => format!("Clear table '{name}'"),
            Self::InsertRows { table, rows, .. } => {
                format!("Insert {} row(s) into '{table}'", rows.len())
            }
        }
    }
}
