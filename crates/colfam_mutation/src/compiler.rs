//! Mutation compiler.
//!
//! Turns intents plus a key predicate into ordered DML. Validation happens
//! up front against the table descriptor, so a rejected batch compiles to
//! nothing.

use colfam_model::{ColumnDescriptor, TableDescriptor};
use colfam_protocol::{coerce_value, ColumnType, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::capabilities::Capabilities;
use crate::dml::{Assignment, CompiledStatement, DeleteTarget, DmlStatement};
use crate::error::ValidationError;
use crate::intent::{MutationIntent, MutationOp};
use crate::predicate::Predicate;
use crate::write::{Ttl, WriteOptions};

/// Compiles mutations for one table.
#[derive(Debug, Clone, Copy)]
pub struct MutationCompiler<'a> {
    table: &'a TableDescriptor,
    capabilities: Capabilities,
}

impl<'a> MutationCompiler<'a> {
    pub fn new(table: &'a TableDescriptor) -> Self {
        Self {
            table,
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn table(&self) -> &'a TableDescriptor {
        self.table
    }

    /// Compile a partial (blind) update of the row or partition selected by `predicate`.
    ///
    /// Sets and collection operations go into one UPDATE; column and map-key
    /// deletions go into a DELETE with the same WHERE clause. When every
    /// intent targets a static column, clustering terms are dropped and only
    /// the partition key is required.
    pub fn compile_update(
        &self,
        intents: &[MutationIntent],
        predicate: &Predicate,
        options: &WriteOptions,
    ) -> Result<CompiledStatement, ValidationError> {
        if intents.is_empty() {
            return Err(ValidationError::EmptyMutation);
        }

        let mut seen = HashSet::new();
        let mut assignments = Vec::new();
        let mut targets = Vec::new();
        let mut static_only = true;

        for intent in intents {
            let column = self.resolve(&intent.column)?;
            if column.primary_key {
                return Err(ValidationError::PrimaryKeyMutation {
                    column: intent.column.clone(),
                });
            }
            if !seen.insert(column.db_name.as_str()) {
                return Err(ValidationError::DuplicateColumn {
                    column: intent.column.clone(),
                });
            }
            static_only &= column.is_static;
            self.compile_intent(column, &intent.op, &mut assignments, &mut targets)?;
        }

        let terms = self.key_terms(predicate, static_only)?;
        if options.if_not_exists {
            debug!(table = %self.table.table, "IF NOT EXISTS does not apply to updates; ignoring");
        }

        let mut statements = Vec::new();
        if !assignments.is_empty() {
            statements.push(DmlStatement::Update {
                table: self.table.table.clone(),
                assignments,
                predicate: terms.clone(),
                ttl: options.effective_ttl(),
                timestamp: options.timestamp,
            });
        }
        if !targets.is_empty() {
            statements.push(DmlStatement::Delete {
                table: self.table.table.clone(),
                targets,
                predicate: terms,
                timestamp: options.timestamp,
            });
        }

        debug!(
            table = %self.table.table,
            intents = intents.len(),
            statements = statements.len(),
            static_only,
            "Compiled update"
        );
        Ok(CompiledStatement::new(statements))
    }

    /// Compile a full-row upsert.
    ///
    /// Columns missing from `values` take their declared default. Nulls are
    /// left out of the INSERT rather than written as tombstones.
    pub fn compile_insert(
        &self,
        values: &[(String, Value)],
        options: &WriteOptions,
    ) -> Result<CompiledStatement, ValidationError> {
        if self.table.is_counter_table() {
            let table = self.table.table.to_string();
            return Err(if options.if_not_exists {
                ValidationError::IfNotExistsWithCounter { table }
            } else {
                ValidationError::CounterInsert { table }
            });
        }

        let mut provided: HashMap<&str, &Value> = HashMap::new();
        for (name, value) in values {
            let column = self.resolve(name)?;
            if provided.insert(column.db_name.as_str(), value).is_some() {
                return Err(ValidationError::DuplicateColumn {
                    column: name.clone(),
                });
            }
        }

        let mut row = Vec::new();
        for column in self
            .table
            .primary_keys()
            .into_iter()
            .chain(self.table.regular_columns())
        {
            let value = match provided.get(column.db_name.as_str()) {
                Some(value) if !value.is_null() => coerce(column, &column.column_type, (*value).clone())?,
                _ => match column.default.produce() {
                    Some(default) => coerce(column, &column.column_type, default)?,
                    None => Value::Null,
                },
            };
            if value.is_null() {
                if column.primary_key {
                    return Err(ValidationError::MissingKey {
                        column: column.name.clone(),
                    });
                }
                if column.required {
                    return Err(ValidationError::RequiredColumn {
                        column: column.name.clone(),
                    });
                }
                continue;
            }
            row.push((column.db_name.clone(), value));
        }

        debug!(table = %self.table.table, columns = row.len(), "Compiled insert");
        Ok(CompiledStatement::new(vec![DmlStatement::Insert {
            table: self.table.table.clone(),
            values: row,
            if_not_exists: options.if_not_exists,
            ttl: options.effective_ttl(),
            timestamp: options.timestamp,
        }]))
    }

    /// Compile a row or partition delete.
    ///
    /// The full partition key is required; clustering terms must form a
    /// prefix of the clustering key.
    pub fn compile_delete(
        &self,
        predicate: &Predicate,
        options: &WriteOptions,
    ) -> Result<CompiledStatement, ValidationError> {
        let terms = self.key_terms(predicate, true)?;
        let mut clustering = self.clustering_terms(predicate)?;

        let mut missing: Option<&ColumnDescriptor> = None;
        for key in self.table.clustering_keys() {
            let present = clustering.iter().any(|(c, _)| *c == key.db_name);
            match (present, missing) {
                (false, None) => missing = Some(key),
                (true, Some(gap)) => {
                    return Err(ValidationError::MissingKey {
                        column: gap.name.clone(),
                    })
                }
                _ => {}
            }
        }

        let mut predicate_terms = terms;
        predicate_terms.append(&mut clustering);
        Ok(CompiledStatement::new(vec![DmlStatement::RowDelete {
            table: self.table.table.clone(),
            predicate: predicate_terms,
            timestamp: options.timestamp,
        }]))
    }

    /// Compile a read by key or by indexed column.
    pub fn compile_select(
        &self,
        predicate: &Predicate,
        limit: Option<usize>,
    ) -> Result<DmlStatement, ValidationError> {
        let mut terms = Vec::new();
        let mut uses_index = false;
        for (name, value) in predicate.terms() {
            let column = self.resolve(name)?;
            if !column.primary_key && !column.is_indexed() {
                return Err(ValidationError::NonKeyPredicate { column: name.clone() });
            }
            uses_index |= column.is_indexed();
            terms.push((column.db_name.clone(), self.key_value(column, value)?));
        }
        if !uses_index {
            for key in self.table.partition_keys() {
                if !terms.iter().any(|(c, _)| *c == key.db_name) {
                    return Err(ValidationError::MissingKey {
                        column: key.name.clone(),
                    });
                }
            }
        }
        Ok(DmlStatement::Select {
            table: self.table.table.clone(),
            predicate: terms,
            limit,
        })
    }

    fn resolve(&self, name: &str) -> Result<&'a ColumnDescriptor, ValidationError> {
        self.table
            .column(name)
            .or_else(|| self.table.column_by_db_name(name))
            .ok_or_else(|| ValidationError::UnknownColumn {
                table: self.table.table.to_string(),
                column: name.to_string(),
            })
    }

    fn compile_intent(
        &self,
        column: &ColumnDescriptor,
        op: &MutationOp,
        assignments: &mut Vec<Assignment>,
        targets: &mut Vec<DeleteTarget>,
    ) -> Result<(), ValidationError> {
        let db_name = column.db_name.clone();
        let column_type = &column.column_type;

        match op {
            MutationOp::Delete | MutationOp::Set(Value::Null) => {
                if column.required {
                    return Err(ValidationError::RequiredColumn {
                        column: column.name.clone(),
                    });
                }
                targets.push(DeleteTarget::Column(db_name));
            }

            MutationOp::Set(value) => {
                if *column_type == ColumnType::Counter {
                    return Err(unsupported(column, op));
                }
                let value = coerce(column, column_type, value.clone())?;
                assignments.push(Assignment::Set { column: db_name, value });
            }

            MutationOp::Add(items) => {
                if !matches!(column_type, ColumnType::Set(_)) {
                    return Err(unsupported(column, op));
                }
                let value = coerce(column, column_type, Value::Set(items.clone()))?;
                assignments.push(Assignment::Add { column: db_name, value });
            }

            MutationOp::Remove(items) => {
                let value = match column_type {
                    ColumnType::Set(_) => coerce(column, column_type, Value::Set(items.clone()))?,
                    ColumnType::List(_) => coerce(column, column_type, Value::List(items.clone()))?,
                    _ => return Err(unsupported(column, op)),
                };
                assignments.push(Assignment::Subtract { column: db_name, value });
            }

            MutationOp::Append(items) => {
                if !matches!(column_type, ColumnType::List(_)) {
                    return Err(unsupported(column, op));
                }
                let value = coerce(column, column_type, Value::List(items.clone()))?;
                assignments.push(Assignment::Add { column: db_name, value });
            }

            MutationOp::Prepend(items) => {
                if !matches!(column_type, ColumnType::List(_)) {
                    return Err(unsupported(column, op));
                }
                let mut items = items.clone();
                if self.capabilities.is_prepend_reversed() {
                    items.reverse();
                }
                let value = coerce(column, column_type, Value::List(items))?;
                assignments.push(Assignment::Prepend { column: db_name, value });
            }

            MutationOp::Merge(entries) => {
                let ColumnType::Map(key_type, _) = column_type else {
                    return Err(unsupported(column, op));
                };
                let mut upserts = Vec::new();
                for (key, value) in entries {
                    match value {
                        Some(value) if !value.is_null() => upserts.push((key.clone(), value.clone())),
                        _ => {
                            if key.is_null() {
                                return Err(ValidationError::invalid_value(
                                    &column.name,
                                    "map keys cannot be null",
                                ));
                            }
                            targets.push(DeleteTarget::MapKey {
                                column: db_name.clone(),
                                key: coerce(column, key_type, key.clone())?,
                            });
                        }
                    }
                }
                if !upserts.is_empty() {
                    let value = coerce(column, column_type, Value::Map(upserts))?;
                    assignments.push(Assignment::Add { column: db_name, value });
                }
            }

            MutationOp::Increment(by) => {
                if *column_type != ColumnType::Counter {
                    return Err(unsupported(column, op));
                }
                let assignment = if *by >= 0 {
                    Assignment::Add {
                        column: db_name,
                        value: Value::BigInt(*by),
                    }
                } else {
                    let magnitude = by.checked_neg().ok_or_else(|| {
                        ValidationError::invalid_value(&column.name, "decrement out of range")
                    })?;
                    Assignment::Subtract {
                        column: db_name,
                        value: Value::BigInt(magnitude),
                    }
                };
                assignments.push(assignment);
            }
        }
        Ok(())
    }

    /// Partition terms plus, unless `partition_only`, clustering terms. All
    /// selected key columns must be present.
    fn key_terms(
        &self,
        predicate: &Predicate,
        partition_only: bool,
    ) -> Result<Vec<(String, Value)>, ValidationError> {
        let mut terms: Vec<(String, Value)> = Vec::new();
        for (name, value) in predicate.terms() {
            let column = self.resolve(name)?;
            if !column.primary_key {
                return Err(ValidationError::NonKeyPredicate { column: name.clone() });
            }
            if terms.iter().any(|(c, _)| *c == column.db_name) {
                return Err(ValidationError::DuplicateColumn { column: name.clone() });
            }
            if partition_only && column.is_clustering_key() {
                continue;
            }
            terms.push((column.db_name.clone(), self.key_value(column, value)?));
        }

        let required = if partition_only {
            self.table.partition_keys()
        } else {
            self.table.primary_keys()
        };
        for key in &required {
            if !terms.iter().any(|(c, _)| *c == key.db_name) {
                return Err(ValidationError::MissingKey {
                    column: key.name.clone(),
                });
            }
        }
        terms.sort_by_key(|(c, _)| required.iter().position(|k| k.db_name == *c));
        Ok(terms)
    }

    /// Clustering terms of `predicate`, in clustering order.
    fn clustering_terms(&self, predicate: &Predicate) -> Result<Vec<(String, Value)>, ValidationError> {
        let mut terms = Vec::new();
        for key in self.table.clustering_keys() {
            let value = predicate
                .get(&key.name)
                .or_else(|| predicate.get(&key.db_name));
            if let Some(value) = value {
                terms.push((key.db_name.clone(), self.key_value(key, value)?));
            }
        }
        Ok(terms)
    }

    fn key_value(&self, column: &ColumnDescriptor, value: &Value) -> Result<Value, ValidationError> {
        if value.is_null() {
            return Err(ValidationError::invalid_value(&column.name, "key values cannot be null"));
        }
        coerce(column, &column.column_type, value.clone())
    }
}

/// Compile a partial update with a plain TTL.
///
/// `None` means no TTL clause; use [`WriteOptions`] for timestamps or layered TTLs.
pub fn compile_mutation(
    table: &TableDescriptor,
    intents: &[MutationIntent],
    predicate: &Predicate,
    ttl: Option<u32>,
) -> Result<CompiledStatement, ValidationError> {
    let options = WriteOptions {
        ttl: Ttl::from(ttl),
        ..WriteOptions::default()
    };
    MutationCompiler::new(table).compile_update(intents, predicate, &options)
}

fn coerce(column: &ColumnDescriptor, column_type: &ColumnType, value: Value) -> Result<Value, ValidationError> {
    coerce_value(column_type, value).map_err(|e| ValidationError::invalid_value(&column.name, e))
}

fn unsupported(column: &ColumnDescriptor, op: &MutationOp) -> ValidationError {
    ValidationError::UnsupportedOperation {
        column: column.name.clone(),
        op: op.name(),
        column_type: column.column_type.to_string(),
    }
}
