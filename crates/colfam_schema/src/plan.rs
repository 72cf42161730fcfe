//! Execution plans and live catalog snapshots.

use colfam_model::{IndexTarget, TableDescriptor};
use colfam_protocol::Statement;
use std::collections::BTreeSet;
use std::fmt;

use crate::change::SchemaChange;

/// A live table as reported by the catalog, with its secondary indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveTable {
    pub descriptor: TableDescriptor,
    pub indexes: BTreeSet<IndexTarget>,
}

impl LiveTable {
    pub fn new(descriptor: TableDescriptor, indexes: BTreeSet<IndexTarget>) -> Self {
        Self {
            descriptor,
            indexes,
        }
    }

    pub fn has_index(&self, target: &IndexTarget) -> bool {
        self.indexes.contains(target)
    }
}

/// A non-key column whose live definition differs from the declared one.
///
/// Reported, never altered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDrift {
    pub column: String,
    pub desired: String,
    pub live: String,
}

impl fmt::Display for ColumnDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column '{}' is declared as {} but live as {}",
            self.column, self.desired, self.live
        )
    }
}

/// Ordered DDL steps that converge the live schema onto the declared one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionPlan {
    pub changes: Vec<SchemaChange>,
    pub drift: Vec<ColumnDrift>,
}

impl ExecutionPlan {
    /// True when no DDL would be issued. Drift does not count.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaChange> {
        self.changes.iter()
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.changes.iter().map(SchemaChange::to_statement).collect()
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.changes.is_empty() {
            writeln!(f, "-- schema is up to date")?;
        }
        for change in &self.changes {
            writeln!(f, "-- {}", change)?;
            writeln!(f, "{};", change.to_cql())?;
        }
        for drift in &self.drift {
            writeln!(f, "-- warning: {}", drift)?;
        }
        Ok(())
    }
}
