//! Database dialect implementations.
//!
//! Each dialect knows how to format SQL for synchronization operations
//! on its database system. Statements common to both backends live in the
//! trait's default methods.

mod mysql;
mod sqlite;

pub use mysql::MySqlDialect;
pub use sqlite::SqliteDialect;

use crate::backend::Backend;
use crate::db::SqlValue;
use crate::operations::{ColumnDef, CopySource, SyncOperation};

static MYSQL: MySqlDialect = MySqlDialect;
static SQLITE: SqliteDialect = SqliteDialect;

/// Returns the dialect for `backend`.
#[must_use]
pub fn dialect_for(backend: Backend) -> &'static dyn SqlDialect {
    match backend {
        Backend::MySql => &MYSQL,
        Backend::Sqlite => &SQLITE,
    }
}

/// Quotes a string literal.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Trait for database-specific SQL generation.
pub trait SqlDialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the auto-increment keyword for this dialect.
    fn auto_increment_keyword(&self) -> &'static str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Table options appended after the column list.
    fn table_options(&self, engine: Option<&str>) -> String;

    /// Keyword placed between `CREATE` and `INDEX` for fulltext indexes.
    fn fulltext_keyword(&self) -> Option<&'static str>;

    /// SQL that removes every row of a table.
    fn clear_table_sql(&self, name: &str) -> String;

    /// SQL that drops an index.
    fn drop_index_sql(&self, name: &str, table: &str) -> String;

    /// Most bind parameters one statement may carry.
    fn max_bind_params(&self) -> usize;

    /// SQL that inserts one row made only of column defaults.
    fn default_row_sql(&self, table: &str) -> String {
        format!("INSERT INTO {} () VALUES ()", self.quote_identifier(table))
    }

    /// Generates column definition SQL.
    fn column_definition(&self, column: &ColumnDef) -> String {
        let mut parts = vec![self.quote_identifier(&column.name), column.sql_type.clone()];
        if column.primary_key {
            parts.push("PRIMARY KEY".to_string());
            parts.push(self.auto_increment_keyword().to_string());
        } else {
            parts.push("NOT NULL".to_string());
            parts.push(format!("DEFAULT {}", quote_literal(&column.default)));
        }
        parts.join(" ")
    }

    /// Generates SQL for creating a table.
    fn create_table_sql(
        &self,
        name: &str,
        columns: &[ColumnDef],
        foreign_keys: &[(String, String)],
        engine: Option<&str>,
    ) -> String {
        let mut defs: Vec<String> = columns.iter().map(|c| self.column_definition(c)).collect();
        for (field, target) in foreign_keys {
            defs.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                self.quote_identifier(field),
                self.quote_identifier(target),
                self.quote_identifier("id")
            ));
        }
        let mut sql = format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote_identifier(name),
            defs.join(",\n  ")
        );
        let options = self.table_options(engine);
        if !options.is_empty() {
            sql.push(' ');
            sql.push_str(&options);
        }
        sql
    }

    /// Generates SQL for renaming a table.
    fn rename_table_sql(&self, old_name: &str, new_name: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(old_name),
            self.quote_identifier(new_name)
        )
    }

    /// Generates SQL for copying rows between tables.
    fn copy_rows_sql(&self, target: &str, source: &str, columns: &[(String, CopySource)]) -> String {
        let targets: Vec<String> = columns
            .iter()
            .map(|(name, _)| self.quote_identifier(name))
            .collect();
        let sources: Vec<String> = columns
            .iter()
            .map(|(name, from)| match from {
                CopySource::Column => self.quote_identifier(name),
                CopySource::Literal(value) => quote_literal(value),
            })
            .collect();
        format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            self.quote_identifier(target),
            targets.join(", "),
            sources.join(", "),
            self.quote_identifier(source)
        )
    }

    /// Generates SQL for creating an index.
    fn create_index_sql(&self, name: &str, table: &str, columns: &[String], fulltext: bool) -> String {
        let mut sql = String::from("CREATE ");
        if fulltext {
            if let Some(keyword) = self.fulltext_keyword() {
                sql.push_str(keyword);
                sql.push(' ');
            }
        }
        let quoted: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        sql.push_str(&format!(
            "INDEX {} ON {} ({})",
            self.quote_identifier(name),
            self.quote_identifier(table),
            quoted.join(", ")
        ));
        sql
    }

    /// Generates SQL inserting `rows` rows with positional placeholders.
    fn insert_rows_sql(&self, table: &str, columns: &[String], rows: usize) -> String {
        if columns.is_empty() {
            return self.default_row_sql(table);
        }
        let quoted: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.quote_identifier(table),
            quoted.join(", "),
            vec![tuple; rows].join(", ")
        )
    }

    /// Splits `rows` into multi-row inserts that stay under the bind limit.
    ///
    /// Returns each statement with its values flattened in bind order. Rows
    /// without columns are inserted one statement each.
    fn insert_batches(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<SqlValue>],
    ) -> Vec<(String, Vec<SqlValue>)> {
        let per_statement = if columns.is_empty() {
            1
        } else {
            (self.max_bind_params() / columns.len()).max(1)
        };
        rows.chunks(per_statement)
            .map(|chunk| (self.insert_rows_sql(table, columns, chunk.len()), chunk.concat()))
            .collect()
    }

    /// Generates SQL for an operation.
    ///
    /// [`SyncOperation::DropImplicitIndexes`] yields nothing here; the
    /// executor expands it against the live table.
    fn generate_sql(&self, operation: &SyncOperation) -> Vec<String> {
        match operation {
            SyncOperation::CreateTable {
                name,
                columns,
                foreign_keys,
                engine,
            } => vec![self.create_table_sql(name, columns, foreign_keys, engine.as_deref())],
            SyncOperation::RenameTable { old_name, new_name } => {
                vec![self.rename_table_sql(old_name, new_name)]
            }
            SyncOperation::CopyRows {
                target,
                source,
                columns,
            } => vec![self.copy_rows_sql(target, source, columns)],
            SyncOperation::DropTable { name } => {
                vec![format!("DROP TABLE {}", self.quote_identifier(name))]
            }
            SyncOperation::CreateIndex {
                name,
                table,
                columns,
                fulltext,
            } => vec![self.create_index_sql(name, table, columns, *fulltext)],
            SyncOperation::DropIndex { name, table } => vec![self.drop_index_sql(name, table)],
            SyncOperation::DropImplicitIndexes { .. } => Vec::new(),
            SyncOperation::ClearTable { name } => vec![self.clear_table_sql(name)],
            SyncOperation::InsertRows {
                table,
                columns,
                rows,
            } => self
                .insert_batches(table, columns, rows)
                .into_iter()
                .map(|(sql, _)| sql)
                .collect(),
        }
    }
}
