//! Mutation and read execution for one table.

use colfam_model::TableDescriptor;
use colfam_mutation::{CompiledBatch, CompiledStatement, MutationCompiler, MutationIntent, Predicate, WriteOptions};
use colfam_protocol::{Row, RowSet, Value};
use tracing::debug;

use crate::error::{DbError, Result};
use crate::session::Session;

/// Column the server adds to the result of a conditional write.
pub const APPLIED_COLUMN: &str = "[applied]";

/// Binds a table descriptor to a session.
///
/// Write options given at construction act as the model-level scope; options
/// passed to each call are layered over them.
pub struct Mapper<'a, S: Session + ?Sized> {
    session: &'a S,
    table: &'a TableDescriptor,
    defaults: WriteOptions,
}

impl<'a, S: Session + ?Sized> Mapper<'a, S> {
    pub fn new(session: &'a S, table: &'a TableDescriptor) -> Self {
        Self {
            session,
            table,
            defaults: WriteOptions::default(),
        }
    }

    /// Model-level write options (typically a default TTL).
    pub fn with_defaults(mut self, defaults: WriteOptions) -> Self {
        self.defaults = defaults;
        self
    }

    fn compiler(&self) -> MutationCompiler<'a> {
        MutationCompiler::new(self.table).with_capabilities(self.session.capabilities())
    }

    /// Insert a full row. With `if_not_exists`, an existing row yields
    /// [`DbError::NotApplied`] carrying that row.
    pub fn create(&self, values: &[(String, Value)], options: WriteOptions) -> Result<()> {
        let options = options.layered_over(self.defaults);
        let compiled = self.compiler().compile_insert(values, &options)?;
        execute_compiled(self.session, &compiled)?;
        Ok(())
    }

    /// Apply column-level intents to the row (or partition) selected by `predicate`.
    pub fn update(&self, predicate: &Predicate, intents: &[MutationIntent], options: WriteOptions) -> Result<()> {
        let options = options.layered_over(self.defaults);
        let compiled = self.compiler().compile_update(intents, predicate, &options)?;
        execute_compiled(self.session, &compiled)?;
        Ok(())
    }

    /// Update from `column__op` keyword pairs.
    pub fn update_from_pairs<K: AsRef<str>>(
        &self,
        predicate: &Predicate,
        pairs: impl IntoIterator<Item = (K, Value)>,
        options: WriteOptions,
    ) -> Result<()> {
        let intents = pairs
            .into_iter()
            .map(|(key, value)| MutationIntent::parse(key.as_ref(), value))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.update(predicate, &intents, options)
    }

    /// Delete the row, or the whole partition when only the partition key is given.
    pub fn delete(&self, predicate: &Predicate, options: WriteOptions) -> Result<()> {
        let options = options.layered_over(self.defaults);
        let compiled = self.compiler().compile_delete(predicate, &options)?;
        execute_compiled(self.session, &compiled)?;
        Ok(())
    }

    /// Queue a full-row insert in `batch` instead of executing it.
    pub fn create_in(&self, batch: &mut CompiledBatch, values: &[(String, Value)], options: WriteOptions) -> Result<()> {
        let options = options.layered_over(self.defaults);
        let compiled = self.compiler().compile_insert(values, &options)?;
        Ok(batch.push(self.table, compiled)?)
    }

    pub fn update_in(
        &self,
        batch: &mut CompiledBatch,
        predicate: &Predicate,
        intents: &[MutationIntent],
        options: WriteOptions,
    ) -> Result<()> {
        let options = options.layered_over(self.defaults);
        let compiled = self.compiler().compile_update(intents, predicate, &options)?;
        Ok(batch.push(self.table, compiled)?)
    }

    pub fn delete_in(&self, batch: &mut CompiledBatch, predicate: &Predicate, options: WriteOptions) -> Result<()> {
        let options = options.layered_over(self.defaults);
        let compiled = self.compiler().compile_delete(predicate, &options)?;
        Ok(batch.push(self.table, compiled)?)
    }

    /// Rows matching `predicate`, by key or indexed column.
    pub fn select(&self, predicate: &Predicate, limit: Option<usize>) -> Result<RowSet> {
        let statement = self.compiler().compile_select(predicate, limit)?.to_statement();
        debug!(table = %self.table.table, query = %statement.query, "Selecting");
        Ok(self.session.execute(&statement)?)
    }

    /// First row matching `predicate`, if any.
    pub fn get(&self, predicate: &Predicate) -> Result<Option<Row>> {
        Ok(self.select(predicate, Some(1))?.into_rows().into_iter().next())
    }
}

/// Run each compiled statement in order.
///
/// Returns the result of the last statement. A conditional insert that the
/// server did not apply stops execution with [`DbError::NotApplied`].
pub fn execute_compiled<S: Session + ?Sized>(session: &S, compiled: &CompiledStatement) -> Result<RowSet> {
    let mut last = RowSet::empty();
    for dml in compiled.iter() {
        let statement = dml.to_statement();
        debug!(table = %dml.table(), query = %statement.query, values = statement.values.len(), "Executing");
        let rows = session.execute(&statement)?;
        if dml.is_conditional() {
            check_applied(&rows)?;
        }
        last = rows;
    }
    Ok(last)
}

/// Send `batch` as one statement. An empty batch is not sent.
///
/// A conditional batch that the server rejected yields
/// [`DbError::NotApplied`] with the row that blocked it; none of its
/// statements were applied.
pub fn execute_batch<S: Session + ?Sized>(session: &S, batch: &CompiledBatch) -> Result<RowSet> {
    if batch.is_empty() {
        return Ok(RowSet::empty());
    }
    let statement = batch.to_statement();
    debug!(statements = batch.len(), kind = ?batch.kind(), conditional = batch.is_conditional(), "Executing batch");
    let rows = session.execute(&statement)?;
    if batch.is_conditional() {
        check_applied(&rows)?;
    }
    Ok(rows)
}

fn check_applied(rows: &RowSet) -> Result<()> {
    match rows.first() {
        Some(row) if row.value(APPLIED_COLUMN) == Some(&Value::Boolean(false)) => Err(DbError::NotApplied {
            existing: row.clone(),
        }),
        _ => Ok(()),
    }
}
