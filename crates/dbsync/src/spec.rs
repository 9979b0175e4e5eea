//! Declarative schema and static-data documents.
//!
//! Both documents are JSON trees deserialized with serde. Attributes keep
//! the loose string form they are authored in (`"true"`, `"yes"`, `"1"`)
//! and are evaluated with [`eval_bool`] when the schema is derived.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::dialected::Dialected;
use crate::error::{Result, SyncError};

/// Evaluates a boolean-ish attribute.
///
/// Accepts `1`, `0`, the empty string, `true`, `false`, `on`, `off`, `yes`
/// and `no`, case-insensitively. Anything else is an error.
pub fn eval_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "" | "false" | "off" | "no" => Ok(false),
        _ => Err(SyncError::InvalidBool(value.to_string())),
    }
}

/// Evaluates an optional attribute, falling back to `default` when absent.
pub fn eval_attr(value: Option<&str>, default: bool) -> Result<bool> {
    value.map_or(Ok(default), eval_bool)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| SyncError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// The schema document: tables with their fields and indexes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Tables in document order.
    #[serde(default)]
    pub tables: Vec<TableNode>,
}

impl SchemaDocument {
    /// Loads a schema document from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref())
    }

    /// Parses a schema document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A table as authored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableNode {
    /// Table name.
    pub name: String,
    /// Boolean-ish flag; ignored tables are never touched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore: Option<String>,
    /// Fields in column order.
    #[serde(default)]
    pub fields: Vec<FieldNode>,
    /// Indexes in document order.
    #[serde(default)]
    pub indexes: Vec<IndexNode>,
}

/// A field as authored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldNode {
    /// Column name.
    pub name: String,
    /// Column type, possibly backend-conditional.
    #[serde(rename = "type")]
    pub sql_type: Dialected,
    /// Boolean-ish primary key flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkey: Option<String>,
    /// Foreign key target table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fkey: Option<String>,
    /// Boolean-ish flag; defaults to true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcheck: Option<String>,
}

/// An index as authored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexNode {
    /// Index name; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Dialected>,
    /// Comma separated field list.
    pub fields: String,
    /// Boolean-ish fulltext flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulltext: Option<String>,
}

/// The static-data document: canonical rows per table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticDocument {
    /// Tables in document order. A table may appear more than once.
    #[serde(default)]
    pub tables: Vec<StaticTable>,
}

impl StaticDocument {
    /// Loads a static-data document from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref())
    }

    /// Parses a static-data document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// All rows of `table`, across every occurrence of the table.
    pub fn rows<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a StaticRow> + 'a {
        self.tables
            .iter()
            .filter(move |t| t.name == table)
            .flat_map(|t| t.rows.iter())
    }
}

/// Rows destined for one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticTable {
    /// Target table.
    pub name: String,
    /// Rows in document order.
    #[serde(default)]
    pub rows: Vec<StaticRow>,
}

/// An ordered field to value map.
///
/// Scalar JSON values (numbers, booleans) are accepted and kept in their
/// textual form; `null` becomes the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StaticRow(pub IndexMap<String, String>);

impl StaticRow {
    /// Builds a row from `(field, value)` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns the value of `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }
}

impl<'de> Deserialize<'de> for StaticRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = IndexMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut row = IndexMap::with_capacity(raw.len());
        for (field, value) in raw {
            let text = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                serde_json::Value::Bool(b) => String::from(if b { "1" } else { "0" }),
                serde_json::Value::Number(n) => n.to_string(),
                other => {
                    return Err(serde::de::Error::custom(format!(
                        "field '{field}' must be a scalar, got {other}"
                    )))
                }
            };
            row.insert(field, text);
        }
        Ok(Self(row))
    }
}
