//! Schema synchronization against a live session.

use colfam_model::{Model, TableDescriptor};
use colfam_schema::{reconcile, ExecutionPlan, SchemaChange};
use tracing::{debug, info};

use crate::error::Result;
use crate::session::{fetch_live_table, Session};

/// Compute the plan that [`synchronize`] would execute, without executing it.
pub fn plan_synchronize<S: Session + ?Sized>(session: &S, desired: &TableDescriptor) -> Result<ExecutionPlan> {
    let live = fetch_live_table(session, &desired.table)?;
    Ok(reconcile(desired, live.as_ref())?)
}

/// Bring the live table in line with `desired`.
///
/// Key mismatches and option errors fail before any statement runs. Each
/// executed change is idempotent, so a failure part way through can be
/// retried by calling this again. Returns the plan that was executed.
pub fn synchronize<S: Session + ?Sized>(session: &S, desired: &TableDescriptor) -> Result<ExecutionPlan> {
    let plan = plan_synchronize(session, desired)?;
    if plan.is_empty() {
        debug!(table = %desired.table, "Nothing to synchronize");
        return Ok(plan);
    }

    for change in plan.iter() {
        info!(table = %desired.table, "{}", change);
        session.execute(&change.to_statement())?;
    }
    info!(table = %desired.table, changes = plan.len(), "Table synchronized");
    Ok(plan)
}

/// [`synchronize`] for a record type.
pub fn synchronize_model<M: Model, S: Session + ?Sized>(session: &S) -> Result<ExecutionPlan> {
    let descriptor = M::describe()?;
    synchronize(session, &descriptor)
}

/// Drop the table. Dropping a table that does not exist is a no-op.
pub fn drop_table<S: Session + ?Sized>(session: &S, table: &TableDescriptor) -> Result<()> {
    if session.fetch_table_metadata(&table.table)?.is_none() {
        debug!(table = %table.table, "Table already absent");
        return Ok(());
    }
    let change = SchemaChange::DropTable {
        table: table.table.clone(),
    };
    info!(table = %table.table, "{}", change);
    session.execute(&change.to_statement())?;
    Ok(())
}

/// [`drop_table`] for a record type.
pub fn drop_model<M: Model, S: Session + ?Sized>(session: &S) -> Result<()> {
    let descriptor = M::describe()?;
    drop_table(session, &descriptor)
}
