//! Batched mutations.
//!
//! A [`CompiledBatch`] collects compiled writes and renders them as a single
//! `BEGIN BATCH ... APPLY BATCH` statement. A timestamp set on the batch
//! applies to every statement inside it, so statements added to such a batch
//! must not carry their own.

use colfam_model::{TableDescriptor, TableName};
use colfam_protocol::{Statement, Value};
use std::fmt;

use crate::dml::{CompiledStatement, DmlStatement};
use crate::error::ValidationError;

/// Batch log behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchKind {
    #[default]
    Logged,
    Unlogged,
    /// Only counter increments and decrements
    Counter,
}

impl BatchKind {
    fn keyword(self) -> &'static str {
        match self {
            BatchKind::Logged => "BEGIN BATCH",
            BatchKind::Unlogged => "BEGIN UNLOGGED BATCH",
            BatchKind::Counter => "BEGIN COUNTER BATCH",
        }
    }
}

/// Writes applied together as one statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledBatch {
    kind: BatchKind,
    timestamp: Option<i64>,
    statements: Vec<DmlStatement>,
    partitions: Vec<(TableName, Vec<Value>)>,
}

impl CompiledBatch {
    pub fn new(kind: BatchKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// `USING TIMESTAMP` for the whole batch, in microseconds.
    pub fn with_timestamp(mut self, micros: i64) -> Self {
        self.timestamp = Some(micros);
        self
    }

    pub fn kind(&self) -> BatchKind {
        self.kind
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn statements(&self) -> &[DmlStatement] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// True when any statement is conditional; the server then answers
    /// with a single `[applied]` row for the whole batch.
    pub fn is_conditional(&self) -> bool {
        self.statements.iter().any(DmlStatement::is_conditional)
    }

    /// Append the statements of one compiled mutation against `table`.
    ///
    /// On error the batch is left unchanged.
    pub fn push(&mut self, table: &TableDescriptor, compiled: CompiledStatement) -> Result<(), ValidationError> {
        let counter = table.is_counter_table();
        if counter && self.kind != BatchKind::Counter {
            return Err(invalid(format!(
                "counter table {} can only be written in a counter batch",
                table.table
            )));
        }
        if !counter && self.kind == BatchKind::Counter {
            return Err(invalid(format!(
                "counter batch cannot write non-counter table {}",
                table.table
            )));
        }

        let mut partitions = self.partitions.clone();
        for statement in &compiled.statements {
            match statement {
                DmlStatement::Select { .. } => return Err(invalid("SELECT cannot be batched")),
                DmlStatement::Insert { timestamp: Some(_), .. }
                | DmlStatement::Update { timestamp: Some(_), .. }
                | DmlStatement::Delete { timestamp: Some(_), .. }
                | DmlStatement::RowDelete { timestamp: Some(_), .. }
                    if self.timestamp.is_some() =>
                {
                    return Err(invalid("statement timestamp conflicts with the batch timestamp"))
                }
                _ => {}
            }
            let partition = (statement.table().clone(), partition_of(table, statement));
            if !partitions.contains(&partition) {
                partitions.push(partition);
            }
        }

        let conditional = self.is_conditional() || compiled.iter().any(DmlStatement::is_conditional);
        if conditional && partitions.len() > 1 {
            return Err(invalid("conditional batch must target a single partition"));
        }

        self.partitions = partitions;
        self.statements.extend(compiled.statements);
        Ok(())
    }

    pub fn to_statement(&self) -> Statement {
        let mut query = self.kind.keyword().to_string();
        if let Some(ts) = self.timestamp {
            query.push_str(&format!(" USING TIMESTAMP {}", ts));
        }
        let mut values = Vec::new();
        for statement in &self.statements {
            let rendered = statement.to_statement();
            query.push(' ');
            query.push_str(&rendered.query);
            query.push(';');
            values.extend(rendered.values);
        }
        query.push_str(" APPLY BATCH");
        Statement::with_values(query, values)
    }
}

impl fmt::Display for CompiledBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};", self.to_statement().inline())
    }
}

fn invalid(reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidBatch { reason: reason.into() }
}

/// Partition key values a statement addresses, in key order.
fn partition_of(table: &TableDescriptor, statement: &DmlStatement) -> Vec<Value> {
    let terms = match statement {
        DmlStatement::Insert { values, .. } => values,
        DmlStatement::Update { predicate, .. }
        | DmlStatement::Delete { predicate, .. }
        | DmlStatement::RowDelete { predicate, .. }
        | DmlStatement::Select { predicate, .. } => predicate,
    };
    table
        .partition_keys()
        .into_iter()
        .filter_map(|key| terms.iter().find(|(c, _)| *c == key.db_name).map(|(_, v)| v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MutationCompiler, MutationIntent, Predicate, WriteOptions};
    use colfam_model::ColumnDescriptor;
    use colfam_protocol::ColumnType;

    fn table() -> TableDescriptor {
        TableDescriptor::builder("ks", "batch_model")
            .column(ColumnDescriptor::new("id", ColumnType::Int).partition_key())
            .column(ColumnDescriptor::new("count", ColumnType::Int))
            .column(ColumnDescriptor::new("text", ColumnType::Text))
            .build()
            .unwrap()
    }

    fn counters() -> TableDescriptor {
        TableDescriptor::builder("ks", "counter_model")
            .column(ColumnDescriptor::new("id", ColumnType::Int).partition_key())
            .column(ColumnDescriptor::new("hits", ColumnType::Counter))
            .build()
            .unwrap()
    }

    fn insert(table: &TableDescriptor, id: i32, options: WriteOptions) -> CompiledStatement {
        MutationCompiler::new(table)
            .compile_insert(
                &[
                    ("id".into(), Value::Int(id)),
                    ("count".into(), Value::Int(id)),
                    ("text".into(), Value::from("a")),
                ],
                &options,
            )
            .unwrap()
    }

    #[test]
    fn test_batch_renders_statements_and_timestamp() {
        let table = table();
        let mut batch = CompiledBatch::new(BatchKind::Logged).with_timestamp(1000);
        batch.push(&table, insert(&table, 1, WriteOptions::new())).unwrap();
        batch.push(&table, insert(&table, 2, WriteOptions::new())).unwrap();

        let stmt = batch.to_statement();
        assert_eq!(
            stmt.query,
            "BEGIN BATCH USING TIMESTAMP 1000 \
             INSERT INTO ks.batch_model (\"id\", \"count\", \"text\") VALUES (?, ?, ?); \
             INSERT INTO ks.batch_model (\"id\", \"count\", \"text\") VALUES (?, ?, ?); \
             APPLY BATCH"
        );
        assert_eq!(stmt.placeholder_count(), stmt.values.len());
        assert_eq!(stmt.values[3], Value::Int(2));
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_conditional());
    }

    #[test]
    fn test_statement_timestamp_conflicts_with_batch_timestamp() {
        let table = table();
        let mut batch = CompiledBatch::new(BatchKind::Unlogged).with_timestamp(1000);
        let err = batch
            .push(&table, insert(&table, 1, WriteOptions::new().timestamp(5)))
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidBatch { .. }));
        assert!(batch.is_empty());

        let mut untimed = CompiledBatch::new(BatchKind::Unlogged);
        untimed
            .push(&table, insert(&table, 1, WriteOptions::new().timestamp(5)))
            .unwrap();
        assert!(untimed
            .to_statement()
            .query
            .starts_with("BEGIN UNLOGGED BATCH INSERT INTO ks.batch_model"));
    }

    #[test]
    fn test_conditional_batch_stays_on_one_partition() {
        let table = table();
        let mut batch = CompiledBatch::default();
        batch
            .push(&table, insert(&table, 8, WriteOptions::new().if_not_exists()))
            .unwrap();
        assert!(batch.is_conditional());

        let same_partition = MutationCompiler::new(&table)
            .compile_update(
                &[MutationIntent::set("text", "b")],
                &Predicate::new().filter("id", 8i32),
                &WriteOptions::new(),
            )
            .unwrap();
        batch.push(&table, same_partition).unwrap();

        let err = batch.push(&table, insert(&table, 9, WriteOptions::new())).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidBatch { .. }));
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_counter_batch_kind_is_enforced() {
        let counters = counters();
        let increment = MutationCompiler::new(&counters)
            .compile_update(
                &[MutationIntent::increment("hits", 1)],
                &Predicate::new().filter("id", 1i32),
                &WriteOptions::new(),
            )
            .unwrap();

        let mut logged = CompiledBatch::default();
        assert!(logged.push(&counters, increment.clone()).is_err());

        let mut counter = CompiledBatch::new(BatchKind::Counter);
        counter.push(&counters, increment).unwrap();
        assert!(counter.to_statement().query.starts_with("BEGIN COUNTER BATCH UPDATE"));

        let table = table();
        assert!(counter.push(&table, insert(&table, 1, WriteOptions::new())).is_err());
    }

    #[test]
    fn test_select_is_rejected() {
        let table = table();
        let lookup = MutationCompiler::new(&table)
            .compile_select(&Predicate::new().filter("id", 1i32), None)
            .unwrap();
        let mut batch = CompiledBatch::default();
        assert!(batch.push(&table, CompiledStatement::new(vec![lookup])).is_err());
    }
}
