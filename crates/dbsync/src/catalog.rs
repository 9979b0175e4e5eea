//! Resolved view of a derived schema for one backend.

use std::collections::BTreeSet;

use crate::backend::Backend;
use crate::derive::DerivedSchema;
use crate::error::Result;
use crate::schema::TableSpec;

/// A field with its type resolved for the active backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogField {
    /// Column name.
    pub name: String,
    /// Uppercase column type.
    pub sql_type: String,
    /// Whether this is the primary key.
    pub primary_key: bool,
    /// Referenced table, if any.
    pub foreign_key: Option<String>,
}

/// An index with its name resolved for the active backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogIndex {
    /// Index name.
    pub name: String,
    /// Indexed fields, in order.
    pub fields: Vec<String>,
    /// Whether a fulltext index is wanted.
    pub fulltext: bool,
}

/// A derived table resolved for the active backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTable {
    /// Table name.
    pub name: String,
    /// Fields in column order.
    pub fields: Vec<CatalogField>,
    /// Indexes in derivation order.
    pub indexes: Vec<CatalogIndex>,
    /// Whether any index is fulltext.
    pub fulltext: bool,
    /// Foreign keys that take part in integrity checks, as (field, table).
    pub checked_foreign_keys: Vec<(String, String)>,
}

impl CatalogTable {
    fn resolve(table: &TableSpec, backend: Backend) -> Result<Self> {
        let fields = table
            .fields
            .iter()
            .map(|field| CatalogField {
                name: field.name.clone(),
                sql_type: field.resolved_type(backend),
                primary_key: field.primary_key,
                foreign_key: field.foreign_key.clone(),
            })
            .collect();
        let indexes = table
            .indexes
            .iter()
            .map(|index| {
                Ok(CatalogIndex {
                    name: index.resolved_name(backend)?,
                    fields: index.fields.clone(),
                    fulltext: index.fulltext,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let checked_foreign_keys = table
            .fields
            .iter()
            .filter(|field| field.check_foreign_key)
            .filter_map(|field| {
                field
                    .foreign_key
                    .as_ref()
                    .map(|target| (field.name.clone(), target.clone()))
            })
            .collect();
        Ok(Self {
            name: table.name.clone(),
            fields,
            indexes,
            fulltext: table.is_fulltext(),
            checked_foreign_keys,
        })
    }

    /// Gets a field by name.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Option<&CatalogField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Gets an index by name.
    #[must_use]
    pub fn get_index(&self, name: &str) -> Option<&CatalogIndex> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

/// Lookup structure over the derived schema, built once per spec hash.
///
/// A catalog is only valid for the documents it was derived from; callers
/// holding on to one should compare [`SchemaCatalog::is_current`] against
/// the hash of the documents they are about to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCatalog {
    hash: String,
    backend: Backend,
    tables: Vec<CatalogTable>,
    ignored: BTreeSet<String>,
}

impl SchemaCatalog {
    /// Resolves `derived` for `backend`, tagging the result with `hash`.
    pub fn build(derived: &DerivedSchema, backend: Backend, hash: impl Into<String>) -> Result<Self> {
        let tables = derived
            .active()
            .map(|table| CatalogTable::resolve(table, backend))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            hash: hash.into(),
            backend,
            tables,
            ignored: derived.ignored().map(ToString::to_string).collect(),
        })
    }

    /// Returns true if the catalog was built from documents hashing to `hash`.
    #[must_use]
    pub fn is_current(&self, hash: &str) -> bool {
        self.hash == hash
    }

    /// The hash this catalog was built from.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// The backend types and names were resolved for.
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Active tables, in derivation order.
    #[must_use]
    pub fn tables(&self) -> &[CatalogTable] {
        &self.tables
    }

    /// Gets an active table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&CatalogTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Returns true if `name` is a derived, non-ignored table.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get_table(name).is_some()
    }

    /// Names of ignored tables.
    #[must_use]
    pub fn ignored(&self) -> &BTreeSet<String> {
        &self.ignored
    }

    /// Names of tables with at least one fulltext index.
    pub fn fulltext_tables(&self) -> impl Iterator<Item = &str> {
        self.tables
            .iter()
            .filter(|t| t.fulltext)
            .map(|t| t.name.as_str())
    }

    /// Checked foreign keys of `table`, as (field, referenced table).
    #[must_use]
    pub fn foreign_keys(&self, table: &str) -> &[(String, String)] {
        self.get_table(table)
            .map_or(&[][..], |t| t.checked_foreign_keys.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, IndexSpec};

    fn derived() -> DerivedSchema {
        let demo = TableSpec::new("tbl_demo")
            .field(FieldSpec::new("id", "/*MYSQL INT(11) *//*SQLITE integer */").primary_key())
            .field(FieldSpec::new("user_id", "int(11)").references("tbl_users"))
            .field(
                FieldSpec::new("group_id", "INT(11)")
                    .references("tbl_groups")
                    .unchecked(),
            )
            .with_index(
                IndexSpec::new("tbl_demo", &["user_id"])
                    .named("/*MYSQL user_id *//*SQLITE tbl_demo_user_id */"),
            );
        let legacy = TableSpec::new("tbl_legacy").ignored();
        DerivedSchema {
            tables: vec![demo, legacy],
        }
    }

    #[test]
    fn test_build_resolves_for_backend() {
        let catalog = SchemaCatalog::build(&derived(), Backend::Sqlite, "abc").unwrap();
        let demo = catalog.get_table("tbl_demo").unwrap();
        assert_eq!(demo.get_field("id").unwrap().sql_type, "INTEGER");
        assert_eq!(demo.get_field("user_id").unwrap().sql_type, "INT(11)");
        assert!(demo.get_index("tbl_demo_user_id").is_some());
        assert!(!catalog.contains("tbl_legacy"));
        assert!(catalog.ignored().contains("tbl_legacy"));
    }

    #[test]
    fn test_checked_foreign_keys() {
        let catalog = SchemaCatalog::build(&derived(), Backend::MySql, "abc").unwrap();
        assert_eq!(
            catalog.foreign_keys("tbl_demo"),
            [("user_id".to_string(), "tbl_users".to_string())]
        );
        assert!(catalog.foreign_keys("missing").is_empty());
    }

    #[test]
    fn test_is_current() {
        let catalog = SchemaCatalog::build(&derived(), Backend::MySql, "abc").unwrap();
        assert!(catalog.is_current("abc"));
        assert!(!catalog.is_current("def"));
        assert_eq!(catalog.fulltext_tables().count(), 0);
    }

    #[test]
    fn test_unnamed_index_is_rejected() {
        let derived = DerivedSchema {
            tables: vec![TableSpec::new("t").field(FieldSpec::new("a", "INT")).index(&["a"])],
        };
        assert!(SchemaCatalog::build(&derived, Backend::MySql, "x").is_err());
    }
}
