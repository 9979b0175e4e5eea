//! MySQL and MariaDB dialect.

use super::SqlDialect;

/// MySQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn table_options(&self, engine: Option<&str>) -> String {
        match engine {
            Some(engine) => format!("ENGINE={engine} CHARSET=utf8mb4"),
            None => "CHARSET=utf8mb4".to_string(),
        }
    }

    fn fulltext_keyword(&self) -> Option<&'static str> {
        Some("FULLTEXT")
    }

    fn clear_table_sql(&self, name: &str) -> String {
        format!("TRUNCATE TABLE {}", self.quote_identifier(name))
    }

    fn max_bind_params(&self) -> usize {
        usize::from(u16::MAX)
    }

    fn drop_index_sql(&self, name: &str, table: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(name),
            self.quote_identifier(table)
        )
    }
}

impl MySqlDialect {
    /// Lists base tables of the current schema.
    pub const LIST_TABLES_SQL: &'static str = "SELECT CAST(TABLE_NAME AS CHAR) \
         FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME";

    /// Lists `(name, type)` of the columns of a table.
    pub const LIST_FIELDS_SQL: &'static str =
        "SELECT CAST(COLUMN_NAME AS CHAR), CAST(COLUMN_TYPE AS CHAR) \
         FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION";

    /// Lists `(index, column)` pairs of a table, primary key excluded.
    pub const LIST_INDEXES_SQL: &'static str =
        "SELECT CAST(INDEX_NAME AS CHAR), CAST(COLUMN_NAME AS CHAR) \
         FROM information_schema.STATISTICS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND INDEX_NAME <> 'PRIMARY' \
         ORDER BY INDEX_NAME, SEQ_IN_INDEX";

    /// Lists storage engines that can be used.
    pub const LIST_ENGINES_SQL: &'static str = "SELECT CAST(ENGINE AS CHAR) \
         FROM information_schema.ENGINES WHERE SUPPORT IN ('YES', 'DEFAULT')";
}
