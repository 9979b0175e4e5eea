//! Schema derivation.
//!
//! Expands the authored schema into the effective table list: satellite
//! tables for flagged apps, an index for every foreign key column and a
//! generated name for every unnamed index.

use indexmap::IndexMap;
use tracing::debug;

use crate::dialected::Dialected;
use crate::error::Result;
use crate::schema::{FieldSpec, IndexSpec, TableSpec};
use crate::spec::{eval_bool, SchemaDocument, StaticDocument, StaticRow};

/// Longest index name either backend accepts.
const MAX_INDEX_NAME: usize = 64;

/// Names of the tables derivation refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeriveOptions {
    /// Target of `user_id` foreign keys in satellite tables.
    pub users_table: String,
    /// Target of `group_id` foreign keys in satellite tables.
    pub groups_table: String,
    /// Static table holding the apps catalog.
    pub apps_table: String,
}

impl Default for DeriveOptions {
    fn default() -> Self {
        Self {
            users_table: "tbl_users".to_string(),
            groups_table: "tbl_groups".to_string(),
            apps_table: "tbl_apps".to_string(),
        }
    }
}

/// The kinds of satellite tables an app can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SatelliteKind {
    /// Fulltext search mirror.
    Index,
    /// Ownership and permissions.
    Control,
    /// Revision history.
    Version,
    /// Attachments.
    Files,
    /// Free-form notes.
    Notes,
}

impl SatelliteKind {
    /// All kinds, in the order satellites are appended.
    pub const ALL: [Self; 5] = [
        Self::Index,
        Self::Control,
        Self::Version,
        Self::Files,
        Self::Notes,
    ];

    /// Table name suffix.
    #[must_use]
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Control => "control",
            Self::Version => "version",
            Self::Files => "files",
            Self::Notes => "notes",
        }
    }

    /// Apps catalog attribute that enables this kind.
    #[must_use]
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Index => "has_index",
            Self::Control => "has_control",
            Self::Version => "has_version",
            Self::Files => "has_files",
            Self::Notes => "has_notes",
        }
    }

    /// Name of the satellite of `base`.
    #[must_use]
    pub fn table_name(&self, base: &str) -> String {
        format!("{base}_{}", self.suffix())
    }

    /// Builds the fixed satellite table for `base`.
    #[must_use]
    pub fn template(&self, base: &str, options: &DeriveOptions) -> TableSpec {
        let id = FieldSpec::new("id", Dialected::per_backend("INT(11)", "INTEGER")).primary_key();
        let user_id = FieldSpec::new("user_id", "INT(11)").references(options.users_table.as_str());
        let datetime = FieldSpec::new("datetime", "DATETIME");
        let reg_id = FieldSpec::new("reg_id", "INT(11)").references(base);
        let name = self.table_name(base);

        match self {
            Self::Index => TableSpec::new(name.clone())
                .field(id)
                .field(FieldSpec::new("search", "MEDIUMTEXT"))
                .with_index(IndexSpec::new(name, &["search"]).fulltext()),
            Self::Control => TableSpec::new(name)
                .field(id.references(base))
                .field(user_id)
                .field(
                    FieldSpec::new("group_id", "INT(11)")
                        .references(options.groups_table.as_str()),
                )
                .field(datetime)
                .field(FieldSpec::new("users_id", "TEXT"))
                .field(FieldSpec::new("groups_id", "TEXT"))
                .index(&["user_id"])
                .index(&["id", "user_id"]),
            Self::Version => TableSpec::new(name)
                .field(id)
                .field(user_id)
                .field(datetime)
                .field(reg_id)
                .field(FieldSpec::new("ver_id", "INT(11)"))
                .field(FieldSpec::new("data", "MEDIUMTEXT"))
                .field(FieldSpec::new("hash", "VARCHAR(255)"))
                .index(&["user_id"])
                .index(&["reg_id"])
                .index(&["ver_id"])
                .index(&["reg_id", "ver_id"]),
            Self::Files => TableSpec::new(name)
                .field(id)
                .field(user_id)
                .field(datetime)
                .field(reg_id)
                .field(FieldSpec::new("uniqid", "VARCHAR(255)"))
                .field(FieldSpec::new("name", "VARCHAR(255)"))
                .field(FieldSpec::new("size", "INT(11)"))
                .field(FieldSpec::new("type", "VARCHAR(255)"))
                .field(FieldSpec::new("file", "VARCHAR(255)"))
                .field(FieldSpec::new("hash", "VARCHAR(255)"))
                .field(FieldSpec::new("search", "MEDIUMTEXT"))
                .field(FieldSpec::new("indexed", "INT(11)"))
                .field(FieldSpec::new("retries", "INT(11)")),
            Self::Notes => TableSpec::new(name)
                .field(id)
                .field(user_id)
                .field(datetime)
                .field(reg_id)
                .field(FieldSpec::new("note", "TEXT")),
        }
    }
}

/// Apps catalog: the rows of the apps static table that name a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppsCatalog {
    by_code: IndexMap<String, StaticRow>,
    by_table: IndexMap<String, StaticRow>,
}

impl AppsCatalog {
    /// Builds the catalog from the static document.
    #[must_use]
    pub fn from_static(doc: &StaticDocument, apps_table: &str) -> Self {
        let mut catalog = Self::default();
        for row in doc.rows(apps_table) {
            let Some(table) = row.get("table").filter(|t| !t.is_empty()) else {
                continue;
            };
            if let Some(code) = row.get("code") {
                catalog.by_code.insert(code.to_string(), row.clone());
            }
            catalog.by_table.insert(table.to_string(), row.clone());
        }
        catalog
    }

    /// App codes, in catalog order.
    pub fn apps(&self) -> impl Iterator<Item = &str> {
        self.by_code.keys().map(String::as_str)
    }

    /// App tables, in catalog order.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.by_table.keys().map(String::as_str)
    }

    /// Looks up an attribute by app code, then by table name.
    #[must_use]
    pub fn field(&self, app_or_table: &str, field: &str) -> Option<&str> {
        self.by_code
            .get(app_or_table)
            .and_then(|row| row.get(field))
            .or_else(|| self.by_table.get(app_or_table).and_then(|row| row.get(field)))
    }

    /// Returns true if `table` asks for the satellite `kind`.
    pub fn has(&self, table: &str, kind: SatelliteKind) -> Result<bool> {
        eval_bool(self.field(table, kind.flag()).unwrap_or(""))
    }
}

/// The output of derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedSchema {
    /// Every table, ignored ones included, in derivation order.
    pub tables: Vec<TableSpec>,
}

impl DerivedSchema {
    /// Tables that take part in diffing.
    pub fn active(&self) -> impl Iterator<Item = &TableSpec> {
        self.tables.iter().filter(|t| !t.ignore)
    }

    /// Names of ignored tables.
    pub fn ignored(&self) -> impl Iterator<Item = &str> {
        self.tables
            .iter()
            .filter(|t| t.ignore)
            .map(|t| t.name.as_str())
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// Expands authored documents into the effective schema.
#[derive(Debug, Clone)]
pub struct SchemaDeriver<'a> {
    options: &'a DeriveOptions,
    apps: &'a AppsCatalog,
}

impl<'a> SchemaDeriver<'a> {
    /// Creates a new deriver.
    #[must_use]
    pub fn new(options: &'a DeriveOptions, apps: &'a AppsCatalog) -> Self {
        Self { options, apps }
    }

    /// Derives the effective schema.
    pub fn derive(&self, doc: SchemaDocument) -> Result<DerivedSchema> {
        let mut tables = doc
            .tables
            .into_iter()
            .map(TableSpec::from_node)
            .collect::<Result<Vec<_>>>()?;

        for base in self.apps.tables() {
            for kind in SatelliteKind::ALL {
                if self.apps.has(base, kind)? {
                    debug!(table = %base, satellite = kind.suffix(), "Adding satellite table");
                    tables.push(kind.template(base, self.options));
                }
            }
        }

        for table in tables.iter_mut().filter(|t| !t.ignore) {
            add_foreign_key_indexes(table);
            name_indexes(table);
        }

        Ok(DerivedSchema { tables })
    }
}

fn add_foreign_key_indexes(table: &mut TableSpec) {
    let missing: Vec<String> = table
        .fields
        .iter()
        .filter(|field| field.foreign_key.is_some())
        .filter(|field| !table.indexes.iter().any(|i| i.covers_only(&field.name)))
        .map(|field| field.name.clone())
        .collect();
    for field in missing {
        table
            .indexes
            .push(IndexSpec::new(table.name.clone(), &[field.as_str()]));
    }
}

fn name_indexes(table: &mut TableSpec) {
    for index in table.indexes.iter_mut().filter(|i| i.name.is_none()) {
        index.name = Some(index_name(&table.name, &index.fields));
    }
}

/// Generated name for an unnamed index.
///
/// MySQL index names are scoped to their table, SQLite names are global,
/// so the SQLite variant carries the table name.
#[must_use]
pub fn index_name(table: &str, fields: &[String]) -> Dialected {
    let joined = fields.join("_");
    let mysql = truncate(&joined.to_lowercase(), MAX_INDEX_NAME);
    let sqlite = truncate(&format!("{table}_{joined}"), MAX_INDEX_NAME);
    Dialected::per_backend(mysql, sqlite)
}

fn truncate(name: &str, max: usize) -> String {
    name.chars().take(max).collect()
}
