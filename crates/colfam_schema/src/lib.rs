//! Schema Reconciliation
//!
//! Converges a live table onto a declared [`TableDescriptor`] using only
//! additive, idempotent DDL:
//!
//! 1. **Absent table**: one `CREATE TABLE`, then its indexes
//! 2. **Primary key**: compared position by position; any difference is a
//!    fatal [`ReconcileError::PrimaryKeyMismatch`], never an ALTER
//! 3. **Columns**: missing columns are added; extra live columns are left
//!    alone; type drift on existing columns is reported on the plan
//! 4. **Indexes**: created when no live index covers the same target
//! 5. **Options**: one `ALTER TABLE ... WITH` restating every declared
//!    option when any of them differs from the catalog
//!
//! Reconciliation is pure: it takes two snapshots and returns an
//! [`ExecutionPlan`]. Executing the plan is the caller's job.
//!
//! [`TableDescriptor`]: colfam_model::TableDescriptor

pub mod change;
mod error;
pub mod plan;
pub mod reconcile;

pub use change::{Replication, SchemaChange};
pub use error::ReconcileError;
pub use plan::{ColumnDrift, ExecutionPlan, LiveTable};
pub use reconcile::{normalize_options, reconcile};
