//! Effective schema representation.
//!
//! These types describe the tables the database is expected to contain once
//! the authored document has been evaluated and expanded. They are rebuilt
//! on every pass and never persisted.

use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::dialected::Dialected;
use crate::error::{Result, SyncError};
use crate::spec::{eval_attr, FieldNode, IndexNode, TableNode};

/// Schema definition for a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Column name.
    pub name: String,
    /// Column type, possibly backend-conditional.
    pub sql_type: Dialected,
    /// Whether this column is the auto-increment primary key.
    pub primary_key: bool,
    /// Referenced table, if any.
    pub foreign_key: Option<String>,
    /// Whether the reference takes part in integrity checks.
    pub check_foreign_key: bool,
}

impl FieldSpec {
    /// Creates a new field.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: impl Into<Dialected>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            primary_key: false,
            foreign_key: None,
            check_foreign_key: true,
        }
    }

    /// Marks the field as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Sets the referenced table.
    #[must_use]
    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.foreign_key = Some(table.into());
        self
    }

    /// Excludes the reference from integrity checks.
    #[must_use]
    pub fn unchecked(mut self) -> Self {
        self.check_foreign_key = false;
        self
    }

    /// Returns the uppercase type for `backend`.
    #[must_use]
    pub fn resolved_type(&self, backend: Backend) -> String {
        self.sql_type.resolve(backend).to_ascii_uppercase()
    }

    fn from_node(node: FieldNode) -> Result<Self> {
        let foreign_key = node.fkey.filter(|target| !target.trim().is_empty());
        Ok(Self {
            primary_key: eval_attr(node.pkey.as_deref(), false)?,
            check_foreign_key: eval_attr(node.fcheck.as_deref(), true)?,
            name: node.name,
            sql_type: node.sql_type,
            foreign_key,
        })
    }
}

/// Schema definition for an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name. Unnamed indexes get a generated name during derivation.
    pub name: Option<Dialected>,
    /// Owning table.
    pub table: String,
    /// Indexed fields, in order.
    pub fields: Vec<String>,
    /// Whether a fulltext index is wanted.
    pub fulltext: bool,
}

impl IndexSpec {
    /// Creates an unnamed index.
    #[must_use]
    pub fn new(table: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            name: None,
            table: table.into(),
            fields: fields.iter().map(ToString::to_string).collect(),
            fulltext: false,
        }
    }

    /// Sets the name.
    #[must_use]
    pub fn named(mut self, name: impl Into<Dialected>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Marks the index as fulltext.
    #[must_use]
    pub fn fulltext(mut self) -> Self {
        self.fulltext = true;
        self
    }

    /// Returns the name for `backend`, or an error if the index has none.
    pub fn resolved_name(&self, backend: Backend) -> Result<String> {
        let name = self
            .name
            .as_ref()
            .map(|name| name.resolve(backend))
            .unwrap_or_default();
        if name.is_empty() {
            return Err(SyncError::Config(format!(
                "index on '{}' ({}) has no name",
                self.table,
                self.fields.join(",")
            )));
        }
        Ok(name)
    }

    /// Returns true if the index covers exactly the single field `field`.
    #[must_use]
    pub fn covers_only(&self, field: &str) -> bool {
        self.fields.len() == 1 && self.fields[0] == field
    }

    fn from_node(table: &str, node: IndexNode) -> Result<Self> {
        let fields = node
            .fields
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        if fields.is_empty() {
            return Err(SyncError::Config(format!(
                "index on '{table}' has no fields"
            )));
        }
        Ok(Self {
            name: node.name.filter(|name| !name.is_empty()),
            table: table.to_string(),
            fields,
            fulltext: eval_attr(node.fulltext.as_deref(), false)?,
        })
    }
}

/// Schema definition for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name.
    pub name: String,
    /// Ignored tables are never created, altered or dropped.
    pub ignore: bool,
    /// Field definitions in column order.
    pub fields: Vec<FieldSpec>,
    /// Index definitions.
    pub indexes: Vec<IndexSpec>,
}

impl TableSpec {
    /// Creates a new table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ignore: false,
            fields: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds an unnamed index over `fields`.
    #[must_use]
    pub fn index(mut self, fields: &[&str]) -> Self {
        let index = IndexSpec::new(self.name.clone(), fields);
        self.indexes.push(index);
        self
    }

    /// Adds a fully specified index.
    #[must_use]
    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// Marks the table as ignored.
    #[must_use]
    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Returns true if any index is fulltext.
    #[must_use]
    pub fn is_fulltext(&self) -> bool {
        self.indexes.iter().any(|index| index.fulltext)
    }

    /// Gets a field by name.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Converts an authored table, evaluating its attributes.
    pub fn from_node(node: TableNode) -> Result<Self> {
        let name = node.name.trim().to_string();
        if name.is_empty() {
            return Err(SyncError::Config("table without a name".to_string()));
        }
        let fields = node
            .fields
            .into_iter()
            .map(FieldSpec::from_node)
            .collect::<Result<Vec<_>>>()?;
        let indexes = node
            .indexes
            .into_iter()
            .map(|index| IndexSpec::from_node(&name, index))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            ignore: eval_attr(node.ignore.as_deref(), false)?,
            name,
            fields,
            indexes,
        })
    }
}
