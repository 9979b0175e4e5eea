//! Pass kinds and their reports.

use std::fmt;

use serde::Serialize;

/// The two synchronization passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    /// Tables, columns and indexes.
    Schema,
    /// Canonical static rows.
    Static,
}

impl SyncKind {
    /// Key under which the pass stores its hash.
    #[must_use]
    pub fn state_key(&self) -> &'static str {
        match self {
            Self::Schema => "dbschema",
            Self::Static => "dbstatic",
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema => f.write_str("schema"),
            Self::Static => f.write_str("static"),
        }
    }
}

/// Outcome of one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Which pass produced this report.
    pub kind: SyncKind,
    /// True when the stored hash was current and nothing ran.
    pub skipped: bool,
    /// True when statements were only collected, not executed.
    pub dry_run: bool,
    /// One line per applied step.
    pub history: Vec<String>,
    /// SQL statements, in execution order.
    pub statements: Vec<String>,
    /// Change count: one per schema step, the row count difference per
    /// static table.
    pub changes: usize,
}

impl SyncReport {
    /// Empty report for a pass that is about to run.
    #[must_use]
    pub fn new(kind: SyncKind) -> Self {
        Self {
            kind,
            skipped: false,
            dry_run: false,
            history: Vec::new(),
            statements: Vec::new(),
            changes: 0,
        }
    }

    /// Report for a pass short-circuited by the hash gate.
    #[must_use]
    pub fn unchanged(kind: SyncKind) -> Self {
        Self {
            skipped: true,
            ..Self::new(kind)
        }
    }

    /// Number of changes made.
    #[must_use]
    pub fn count(&self) -> usize {
        self.changes
    }

    /// Returns true if the pass changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.history.is_empty()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.skipped {
            return write!(f, "{}: up to date", self.kind);
        }
        writeln!(f, "{}: {} change(s)", self.kind, self.count())?;
        for line in &self.history {
            writeln!(f, "  {line}")?;
        }
        Ok(())
    }
}
