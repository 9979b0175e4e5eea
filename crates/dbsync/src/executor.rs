//! Plan executor.
//!
//! Runs the operations of a plan in order. The first failing statement
//! aborts the pass; there are no transactions, so a failed pass leaves the
//! database wherever it stopped and the next run plans from there.

use tracing::{debug, info};

use crate::db::{Database, SqlValue};
use crate::dialect::{dialect_for, SqlDialect};
use crate::error::Result;
use crate::introspect::Introspector;
use crate::operations::SyncOperation;
use crate::planner::Plan;
use crate::report::SyncReport;

/// Executes plans against a database.
pub struct Executor {
    db: Database,
    dialect: &'static dyn SqlDialect,
    introspector: Introspector,
    dry_run: bool,
}

impl Executor {
    /// Creates a new executor.
    #[must_use]
    pub fn new(db: Database) -> Self {
        let dialect = dialect_for(db.backend());
        let introspector = Introspector::new(db.clone());
        Self {
            db,
            dialect,
            introspector,
            dry_run: false,
        }
    }

    /// Enables dry-run mode (SQL is collected but not executed).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Runs every step of `plan`, recording history and SQL in `report`.
    pub async fn execute(&self, plan: &Plan, report: &mut SyncReport) -> Result<()> {
        report.dry_run = self.dry_run;
        for step in &plan.steps {
            info!(step = %step.summary, dry_run = self.dry_run, "Applying step");
            for operation in &step.operations {
                self.execute_operation(operation, report).await?;
            }
            report.history.push(step.summary.clone());
            report.changes += step.changes;
        }
        Ok(())
    }

    async fn execute_operation(&self, operation: &SyncOperation, report: &mut SyncReport) -> Result<()> {
        match operation {
            SyncOperation::DropImplicitIndexes { table } => {
                // Nothing exists yet in dry-run mode.
                if self.dry_run {
                    return Ok(());
                }
                for name in self.introspector.list_indexes(table).await?.into_keys() {
                    debug!(table = %table, index = %name, "Dropping implicit index");
                    let sql = self.dialect.drop_index_sql(&name, table);
                    self.run(&sql, &[], report).await?;
                }
            }
            SyncOperation::InsertRows {
                table,
                columns,
                rows,
            } => {
                for (sql, values) in self.dialect.insert_batches(table, columns, rows) {
                    self.run(&sql, &values, report).await?;
                }
            }
            _ => {
                for sql in self.dialect.generate_sql(operation) {
                    self.run(&sql, &[], report).await?;
                }
            }
        }
        Ok(())
    }

    async fn run(
        &self,
        sql: &str,
        values: &[SqlValue],
        report: &mut SyncReport,
    ) -> Result<()> {
        if values.is_empty() {
            report.statements.push(sql.to_string());
        } else {
            let rendered: Vec<String> = values.iter().map(ToString::to_string).collect();
            report
                .statements
                .push(format!("{sql} -- [{}]", rendered.join(", ")));
        }
        if self.dry_run {
            return Ok(());
        }
        if values.is_empty() {
            self.db.execute(sql).await?;
        } else {
            self.db.execute_with(sql, values).await?;
        }
        Ok(())
    }
}
