//! SQLite dialect.

use super::SqlDialect;

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTOINCREMENT"
    }

    fn table_options(&self, _engine: Option<&str>) -> String {
        String::new()
    }

    fn fulltext_keyword(&self) -> Option<&'static str> {
        None
    }

    fn clear_table_sql(&self, name: &str) -> String {
        format!("DELETE FROM {}", self.quote_identifier(name))
    }

    // SQLITE_MAX_VARIABLE_NUMBER before 3.32.
    fn max_bind_params(&self) -> usize {
        999
    }

    fn default_row_sql(&self, table: &str) -> String {
        format!("INSERT INTO {} DEFAULT VALUES", self.quote_identifier(table))
    }

    // SQLite index names are global to the database.
    fn drop_index_sql(&self, name: &str, _table: &str) -> String {
        format!("DROP INDEX {}", self.quote_identifier(name))
    }
}

impl SqliteDialect {
    /// Lists base tables, skipping SQLite internals.
    pub const LIST_TABLES_SQL: &'static str = "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

    /// Lists `(name, type)` of the columns of a table.
    pub const LIST_FIELDS_SQL: &'static str =
        "SELECT name, type FROM pragma_table_info(?) ORDER BY cid";

    /// Lists the non-primary indexes of a table.
    pub const LIST_INDEXES_SQL: &'static str = "SELECT name FROM pragma_index_list(?) \
         WHERE origin <> 'pk' AND name NOT LIKE 'sqlite_autoindex_%' ORDER BY name";

    /// Lists the columns of an index in order.
    pub const LIST_INDEX_FIELDS_SQL: &'static str =
        "SELECT name FROM pragma_index_info(?) ORDER BY seqno";
}
