//! Column type classification.
//!
//! Every field type in a schema document maps to one of six coarse
//! classes. The class decides how static values are cast and which zero
//! value is used when a column has no source during a copy.

use crate::error::{Result, SyncError};

/// Coarse type class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    /// Integer types.
    Int,
    /// Floating point and fixed point types.
    Float,
    /// `DATE`.
    Date,
    /// `TIME`.
    Time,
    /// `DATETIME` and `TIMESTAMP`.
    DateTime,
    /// Character and text types.
    String,
}

impl TypeClass {
    /// Classifies a type string such as `VARCHAR(255)` or `int(11) unsigned`.
    pub fn of(sql_type: &str) -> Result<Self> {
        let class = match base_type(sql_type).as_str() {
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "INTEGER" => Self::Int,
            "DECIMAL" | "NUMERIC" | "FLOAT" | "REAL" | "DOUBLE" => Self::Float,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "DATETIME" | "TIMESTAMP" => Self::DateTime,
            "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" => Self::String,
            _ => return Err(SyncError::UnknownType(sql_type.to_string())),
        };
        Ok(class)
    }

    /// The literal written into columns that have no other value.
    #[must_use]
    pub fn zero_value(&self) -> &'static str {
        match self {
            Self::Int | Self::Float => "0",
            Self::String => "",
            Self::Date => "1970-01-01",
            Self::Time => "00:00:00",
            Self::DateTime => "1970-01-01 00:00:00",
        }
    }
}

/// Returns the uppercased base keyword of a type, without size or modifiers.
fn base_type(sql_type: &str) -> String {
    sql_type
        .trim()
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or("")
        .to_ascii_uppercase()
}

/// Returns the number inside the parentheses of a type, if any.
fn declared_size(sql_type: &str) -> Option<u64> {
    let (_, rest) = sql_type.split_once('(')?;
    let (inner, _) = rest.split_once(')')?;
    inner.split(',').next()?.trim().parse().ok()
}

/// Maximum number of characters a string-class column can hold.
///
/// `VARCHAR(n)` and `CHAR(n)` report their declared size; the text types
/// report their fixed capacity.
pub fn type_size(sql_type: &str) -> Result<u64> {
    let size = match base_type(sql_type).as_str() {
        "CHAR" | "VARCHAR" => declared_size(sql_type),
        "TINYTEXT" => Some(255),
        "TEXT" => Some(65_535),
        "MEDIUMTEXT" => Some(16_777_215),
        "LONGTEXT" => Some(4_294_967_295),
        _ => None,
    };
    size.ok_or_else(|| SyncError::UnknownType(sql_type.to_string()))
}

/// Normalizes a type spelling for shape comparison.
///
/// Uppercases, collapses whitespace and drops integer display widths, so
/// that `int(11)` as reported by MySQL 8 matches `INT(11)` and `INT`.
/// `INTEGER` folds to `INT`, the spelling MySQL reports it with.
#[must_use]
pub fn normalize_type(sql_type: &str) -> String {
    let collapsed = sql_type
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    if !matches!(TypeClass::of(&collapsed), Ok(TypeClass::Int)) {
        return collapsed;
    }

    let mut out = match (collapsed.find('('), collapsed.find(')')) {
        (Some(open), Some(close)) if open < close => {
            let mut out = collapsed[..open].to_string();
            out.push_str(&collapsed[close + 1..]);
            out.split_whitespace().collect::<Vec<_>>().join(" ")
        }
        _ => collapsed,
    };
    if out == "INTEGER" || out.starts_with("INTEGER ") {
        out.replace_range(.."INTEGER".len(), "INT");
    }
    out
}
